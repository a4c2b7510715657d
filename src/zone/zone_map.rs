use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{AuthServer, Zone};

/// Maps zone names to their DNSSEC state and, indirectly through the
/// Auth-Server Registry, to the servers that are authoritative for them
/// (§4.3). Holds `Zone` by `Arc` so callers can retain a handle across an
/// await point.
pub struct ZoneMap {
    zones: DashMap<String, Arc<Zone>>,
}

impl Default for ZoneMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneMap {
    pub fn new() -> Self {
        Self {
            zones: DashMap::new(),
        }
    }

    pub fn get(&self, zone: &str) -> Option<Arc<Zone>> {
        self.zones.get(&zone.to_ascii_lowercase()).map(|z| z.clone())
    }

    pub fn get_or_create(&self, zone: &str) -> Arc<Zone> {
        let key = zone.to_ascii_lowercase();
        self.zones
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Zone::new(key)))
            .clone()
    }

    pub fn set(&self, zone: Arc<Zone>) {
        self.zones.insert(zone.name.clone(), zone);
    }

    /// Walk labels from `name` toward the root, returning the deepest known
    /// zone whose server set (looked up via `servers_of`) is non-empty.
    pub fn find_closest<F>(&self, name: &str, servers_of: F) -> Option<(Arc<Zone>, Vec<Arc<AuthServer>>)>
    where
        F: Fn(&str) -> Vec<Arc<AuthServer>>,
    {
        let labels: Vec<&str> = name.trim_end_matches('.').split('.').collect();
        for start in 0..=labels.len() {
            let candidate = if start == labels.len() {
                ".".to_string()
            } else {
                labels[start..].join(".")
            };
            if let Some(zone) = self.get(&candidate) {
                let servers = servers_of(&candidate);
                if !servers.is_empty() {
                    return Some((zone, servers));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_the_same_instance() {
        let map = ZoneMap::new();
        let a = map.get_or_create("example.com");
        let b = map.get_or_create("Example.com");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn find_closest_walks_from_specific_to_root() {
        let map = ZoneMap::new();
        map.set(Arc::new(Zone::new("com".into())));
        map.set(Arc::new(Zone::new("example.com".into())));

        let (zone, _) = map
            .find_closest("www.example.com", |z| {
                if z == "com" {
                    vec![Arc::new(AuthServer::new(
                        "a.gtld-servers.net".into(),
                        crate::model::Source::Hint,
                    ))]
                } else {
                    vec![]
                }
            })
            .expect("com should be found");
        assert_eq!(zone.name, "com");
    }
}
