use std::time::{Duration, Instant};

use dashmap::DashMap;
use fnv::FnvBuildHasher;

use crate::dns::enums::DNSResourceType;
use crate::model::{CachedRRset, Context};

/// Key into the RRset Cache: a lowercase FQDN and the queried type.
type Key = (String, DNSResourceType);

/// The structural record types preserved by `flush_domain(.., keep_structural
/// = true)` (§4.1).
fn is_structural(rtype: DNSResourceType) -> bool {
    matches!(
        rtype,
        DNSResourceType::NS
            | DNSResourceType::DS
            | DNSResourceType::DNSKEY
            | DNSResourceType::A
            | DNSResourceType::AAAA
    )
}

/// The cache of resolved and negative answers, sharded via `DashMap` and
/// hashed with FNV-32a, mirroring the teacher's preference for `dashmap`
/// over an ad hoc `Mutex<HashMap<..>>` (§4.1, §9 Design Notes).
pub struct RRsetCache {
    entries: DashMap<Key, CachedRRset, FnvBuildHasher>,
}

impl Default for RRsetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RRsetCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(FnvBuildHasher::default()),
        }
    }

    /// Returns the entry if present and unexpired; lazily evicts and returns
    /// none otherwise.
    pub fn get(&self, name: &str, qtype: DNSResourceType) -> Option<CachedRRset> {
        let key = (name.to_ascii_lowercase(), qtype);
        let now = Instant::now();
        let expired = self
            .entries
            .get(&key)
            .map(|entry| entry.is_expired(now))
            .unwrap_or(false);
        if expired {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key).map(|e| e.clone())
    }

    /// Insert or replace the entry for `(name, qtype)`. The supplied
    /// `expiration` is clamped to the RRset's own minimum TTL, if present.
    pub fn set(&self, name: &str, qtype: DNSResourceType, mut entry: CachedRRset) {
        if let Some(rrset) = &entry.rrset {
            let ttl_expiration = Instant::now() + Duration::from_secs(rrset.min_ttl() as u64);
            entry.expiration = entry.expiration.min(ttl_expiration);
        }
        let key = (name.to_ascii_lowercase(), qtype);
        self.entries.insert(key, entry);
    }

    /// Remove every entry at or below `name`. Returns the number removed.
    pub fn flush_domain(&self, name: &str, keep_structural: bool) -> usize {
        let suffix = name.to_ascii_lowercase();
        let mut removed = 0;
        self.entries.retain(|(entry_name, rtype), entry| {
            let under = entry_name == &suffix || entry_name.ends_with(&format!(".{suffix}"));
            if !under {
                return true;
            }
            if keep_structural && is_structural(*rtype) && entry.context != Context::Failure {
                return true;
            }
            removed += 1;
            false
        });
        removed
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
    use crate::dns::enums::ResponseCode;
    use crate::model::ValidationState;

    fn answer(ttl_secs: u64) -> CachedRRset {
        CachedRRset {
            rcode: ResponseCode::NoError,
            rrset: None,
            neg_authority: None,
            context: Context::Answer,
            state: ValidationState::Insecure,
            expiration: Instant::now() + Duration::from_secs(ttl_secs),
            ede: None,
        }
    }

    #[test]
    fn get_on_empty_cache_is_none() {
        let cache = RRsetCache::new();
        assert!(cache.get("example.com", DNSResourceType::A).is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache = RRsetCache::new();
        cache.set("Example.COM", DNSResourceType::A, answer(300));
        let found = cache.get("example.com", DNSResourceType::A);
        assert!(found.is_some());
    }

    #[test]
    fn expired_entries_are_evicted_on_access() {
        let cache = RRsetCache::new();
        let mut entry = answer(300);
        entry.expiration = Instant::now() - Duration::from_secs(1);
        cache.set("example.com", DNSResourceType::A, entry);
        assert!(cache.get("example.com", DNSResourceType::A).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn flush_domain_removes_subdomains() {
        let cache = RRsetCache::new();
        cache.set("www.example.com", DNSResourceType::A, answer(300));
        cache.set("example.com", DNSResourceType::A, answer(300));
        cache.set("example.org", DNSResourceType::A, answer(300));
        let removed = cache.flush_domain("example.com", false);
        assert_eq!(removed, 2);
        assert!(cache.get("example.org", DNSResourceType::A).is_some());
    }

    #[test]
    fn flush_domain_is_idempotent() {
        let cache = RRsetCache::new();
        cache.set("www.example.com", DNSResourceType::A, answer(300));
        assert_eq!(cache.flush_domain("example.com", true), 1);
        assert_eq!(cache.flush_domain("example.com", true), 0);
    }

    #[test]
    fn flush_domain_keep_structural_preserves_ns_and_address_records() {
        let cache = RRsetCache::new();
        cache.set("example.com", DNSResourceType::NS, answer(300));
        cache.set("example.com", DNSResourceType::TXT, answer(300));
        let removed = cache.flush_domain("example.com", true);
        assert_eq!(removed, 1);
        assert!(cache.get("example.com", DNSResourceType::NS).is_some());
        assert!(cache.get("example.com", DNSResourceType::TXT).is_none());
    }
}
