use std::time::Instant;

use crate::dns::enums::{DNSResourceClass, DNSResourceType, ResponseCode};
use crate::dns::resource::DNSResource;

/// An owned RRset: same name/class/type, unordered multiset of records with
/// duplicates prohibited, plus any covering RRSIGs (§3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RRset {
    pub name: String,
    pub class: DNSResourceClass,
    pub rrtype: DNSResourceType,
    pub records: Vec<DNSResource>,
    pub rrsigs: Vec<DNSResource>,
}

impl RRset {
    pub fn new(name: String, class: DNSResourceClass, rrtype: DNSResourceType) -> Self {
        Self {
            name,
            class,
            rrtype,
            records: Vec::new(),
            rrsigs: Vec::new(),
        }
    }

    /// Insert a record, silently dropping it if an identical one is already
    /// present (multiset with duplicates prohibited).
    pub fn push(&mut self, record: DNSResource) {
        if !self.records.contains(&record) {
            self.records.push(record);
        }
    }

    /// The minimum TTL across all member records, used to derive cache
    /// expiration (§3.2).
    pub fn min_ttl(&self) -> u32 {
        self.records.iter().map(|r| r.ttl).min().unwrap_or(0)
    }
}

/// Why a cached RRset exists: whether it is directly answerable to a caller
/// or only useful internally to the resolution process (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Answer,
    Hint,
    Priming,
    Referral,
    NXDomain,
    NoErrNoAns,
    Glue,
    Failure,
}

impl Context {
    /// Whether an entry in this context may be returned directly to a
    /// caller without issuing a fresh query.
    pub fn caller_visible(self) -> bool {
        matches!(
            self,
            Context::Answer | Context::NXDomain | Context::NoErrNoAns
        )
    }
}

/// DNSSEC validation outcome attached to a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
    #[default]
    None,
    Insecure,
    Secure,
    Bogus,
    Indeterminate,
}

/// An Extended DNS Error (RFC 8914) code plus free-text detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedError {
    pub code: u16,
    pub text: Option<String>,
}

/// A cached answer to `(name, rrtype)` (§3.2).
#[derive(Debug, Clone)]
pub struct CachedRRset {
    pub rcode: ResponseCode,
    pub rrset: Option<RRset>,
    pub neg_authority: Option<Vec<RRset>>,
    pub context: Context,
    pub state: ValidationState,
    pub expiration: Instant,
    pub ede: Option<ExtendedError>,
}

impl CachedRRset {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiration
    }

    /// Whether this entry may satisfy a caller's query directly.
    pub fn is_caller_visible(&self) -> bool {
        self.context.caller_visible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn resource(ttl: u32) -> DNSResource {
        DNSResource {
            labels: vec!["example".into(), "com".into()],
            rtype: DNSResourceType::A,
            rclass: DNSResourceClass::IN,
            ttl,
            rdlength: 4,
            rdata: vec![127, 0, 0, 1],
            parsed_rdata: None,
            raw_class: None,
        }
    }

    #[test]
    fn rrset_rejects_duplicate_records() {
        let mut rrset = RRset::new("example.com".into(), DNSResourceClass::IN, DNSResourceType::A);
        rrset.push(resource(300));
        rrset.push(resource(300));
        assert_eq!(rrset.records.len(), 1);
    }

    #[test]
    fn min_ttl_is_the_smallest_member() {
        let mut rrset = RRset::new("example.com".into(), DNSResourceClass::IN, DNSResourceType::A);
        rrset.push(resource(300));
        rrset.push(resource(60));
        assert_eq!(rrset.min_ttl(), 60);
    }

    #[test]
    fn caller_visible_contexts() {
        assert!(Context::Answer.caller_visible());
        assert!(Context::NXDomain.caller_visible());
        assert!(Context::NoErrNoAns.caller_visible());
        assert!(!Context::Referral.caller_visible());
        assert!(!Context::Glue.caller_visible());
    }

    #[test]
    fn expiration_is_checked_against_now() {
        let cached = CachedRRset {
            rcode: ResponseCode::NoError,
            rrset: None,
            neg_authority: None,
            context: Context::Answer,
            state: ValidationState::Secure,
            expiration: Instant::now() - Duration::from_secs(1),
            ede: None,
        };
        assert!(cached.is_expired(Instant::now()));
    }
}
