use std::time::Instant;

use crate::dns::resource::DNSResource;

use super::rrset::{RRset, ValidationState};

/// A cached DNSKEY, keyed by `(zone, keyid)` (§3.3).
#[derive(Debug, Clone)]
pub struct CachedDnskey {
    pub state: ValidationState,
    pub trust_anchor: bool,
    pub dnskey: DNSResource,
    pub dnskey_rrset: RRset,
    pub expiration: Instant,
}

impl CachedDnskey {
    /// A trust-anchor entry never expires by TTL.
    pub fn is_expired(&self, now: Instant) -> bool {
        !self.trust_anchor && now >= self.expiration
    }
}
