use std::time::Instant;

use dashmap::DashMap;

use crate::model::{CachedDnskey, ValidationState};

type Key = (String, u16);

/// The cache of validated (and trust-anchor) DNSKEYs, keyed by `(zone,
/// keyid)` (§4.2).
pub struct DnskeyCache {
    entries: DashMap<Key, CachedDnskey>,
}

impl Default for DnskeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DnskeyCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, zone: &str, keyid: u16) -> Option<CachedDnskey> {
        let key = (zone.to_ascii_lowercase(), keyid);
        let now = Instant::now();
        let expired = self
            .entries
            .get(&key)
            .map(|e| e.is_expired(now))
            .unwrap_or(false);
        if expired {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key).map(|e| e.clone())
    }

    /// Upsert. A trust-anchor entry, once present, is never replaced by a
    /// non-trust-anchor entry for the same key.
    pub fn set(&self, zone: &str, keyid: u16, entry: CachedDnskey) {
        let key = (zone.to_ascii_lowercase(), keyid);
        if !entry.trust_anchor {
            if let Some(existing) = self.entries.get(&key) {
                if existing.trust_anchor {
                    return;
                }
            }
        }
        self.entries.insert(key, entry);
    }

    pub fn list_trust_anchors(&self) -> Vec<CachedDnskey> {
        self.entries
            .iter()
            .filter(|e| e.trust_anchor)
            .map(|e| e.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::{DNSResourceClass, DNSResourceType};
    use crate::dns::resource::DNSResource;
    use crate::model::RRset;
    use std::time::Duration;

    fn sample_key(trust_anchor: bool) -> CachedDnskey {
        let record = DNSResource {
            labels: vec![],
            rtype: DNSResourceType::DNSKEY,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdlength: 0,
            rdata: vec![],
            parsed_rdata: None,
            raw_class: None,
        };
        CachedDnskey {
            state: ValidationState::Secure,
            trust_anchor,
            dnskey: record.clone(),
            dnskey_rrset: RRset {
                name: "com".into(),
                class: DNSResourceClass::IN,
                rrtype: DNSResourceType::DNSKEY,
                records: vec![record],
                rrsigs: vec![],
            },
            expiration: Instant::now() + Duration::from_secs(3600),
        }
    }

    #[test]
    fn trust_anchor_survives_non_anchor_overwrite() {
        let cache = DnskeyCache::new();
        cache.set("com", 1, sample_key(true));
        cache.set("com", 1, sample_key(false));
        let entry = cache.get("com", 1).unwrap();
        assert!(entry.trust_anchor);
    }

    #[test]
    fn list_trust_anchors_excludes_others() {
        let cache = DnskeyCache::new();
        cache.set("com", 1, sample_key(true));
        cache.set("net", 2, sample_key(false));
        let anchors = cache.list_trust_anchors();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].dnskey_rrset.name, "com");
    }
}
