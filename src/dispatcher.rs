use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::ResolverContext;
use crate::dns::enums::DNSResourceType;
use crate::engine::{self, ResolveOutcome};
use crate::model::{CachedRRset, Context, ValidationState};

/// Key identifying one logical query for single-flight purposes: lowercase
/// name plus type (§2, §5 — class is always IN in this resolver).
type DedupeKey = (String, DNSResourceType);

/// An in-flight query that other callers for the same key can join instead
/// of issuing a redundant resolution, grounded on the teacher's
/// `InFlightQuery`/broadcast pattern in `resolver.rs`.
struct InFlightQuery {
    sender: broadcast::Sender<SharedOutcome>,
    waiting_count: AtomicU32,
}

/// `ResolveOutcome` doesn't implement `Clone` (it owns a non-`Clone`
/// `ResolverError`); the dispatcher broadcasts a reduced, cloneable shape
/// instead and lets only the resolving caller see the original error detail.
#[derive(Clone)]
struct SharedOutcome {
    rcode: crate::dns::enums::ResponseCode,
    rrset: Option<crate::model::RRset>,
    context: Context,
    state: ValidationState,
    ede: Option<crate::model::ExtendedError>,
}

impl From<&ResolveOutcome> for SharedOutcome {
    fn from(o: &ResolveOutcome) -> Self {
        Self {
            rcode: o.rcode,
            rrset: o.rrset.clone(),
            context: o.context,
            state: o.state,
            ede: o.ede.clone(),
        }
    }
}

impl From<SharedOutcome> for ResolveOutcome {
    fn from(s: SharedOutcome) -> Self {
        Self {
            rcode: s.rcode,
            rrset: s.rrset,
            context: s.context,
            state: s.state,
            error: None,
            ede: s.ede,
        }
    }
}

/// Fronts the Iterative Engine with a cache shortcut and single-flight
/// deduplication (§2, §5, §6.1).
pub struct Dispatcher {
    ctx: Arc<ResolverContext>,
    in_flight: DashMap<DedupeKey, InFlightQuery>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<ResolverContext>) -> Self {
        Self {
            ctx,
            in_flight: DashMap::new(),
        }
    }

    pub async fn resolve(&self, qname: &str, qtype: DNSResourceType) -> ResolveOutcome {
        let key: DedupeKey = (qname.trim_end_matches('.').to_ascii_lowercase(), qtype);

        if let Some(cached) = self.ctx.rrset_cache.get(&key.0, qtype) {
            if cached.is_caller_visible() {
                self.ctx.metrics.record_cache_hit("rrset");
                return outcome_from_cache(cached);
            }
        }
        self.ctx.metrics.record_cache_miss("rrset");
        self.ctx.metrics.record_query(qtype_label(qtype));

        if let Some(in_flight) = self.in_flight.get(&key) {
            in_flight.waiting_count.fetch_add(1, Ordering::Relaxed);
            let mut receiver = in_flight.sender.subscribe();
            drop(in_flight);
            debug!(name = %key.0, ?qtype, "joining in-flight query");
            if let Ok(shared) = receiver.recv().await {
                return shared.into();
            }
            // Sender dropped before we subscribed; fall through and resolve ourselves.
        }

        self.resolve_alone(key).await
    }

    async fn resolve_alone(&self, key: DedupeKey) -> ResolveOutcome {
        let (sender, _receiver) = broadcast::channel(32);
        let in_flight = InFlightQuery {
            sender: sender.clone(),
            waiting_count: AtomicU32::new(1),
        };

        if self.in_flight.insert(key.clone(), in_flight).is_some() {
            // Lost a race with another first-caller; join theirs instead.
            if let Some(existing) = self.in_flight.get(&key) {
                let mut receiver = existing.sender.subscribe();
                drop(existing);
                if let Ok(shared) = receiver.recv().await {
                    return shared.into();
                }
            }
        }

        let cancel = CancellationToken::new();
        let outcome = engine::resolve(&self.ctx, cancel, &key.0, key.1, false).await;

        if let Some((_, in_flight)) = self.in_flight.remove(&key) {
            let waiting = in_flight.waiting_count.load(Ordering::Relaxed);
            if waiting > 1 {
                debug!(name = %key.0, waiting = waiting - 1, "broadcasting result to joined callers");
            }
            let _ = sender.send(SharedOutcome::from(&outcome));
        }

        outcome
    }
}

fn outcome_from_cache(cached: CachedRRset) -> ResolveOutcome {
    ResolveOutcome {
        rcode: cached.rcode,
        rrset: cached.rrset,
        context: cached.context,
        state: cached.state,
        error: None,
        ede: cached.ede,
    }
}

fn qtype_label(qtype: DNSResourceType) -> &'static str {
    match qtype {
        DNSResourceType::A => "A",
        DNSResourceType::AAAA => "AAAA",
        DNSResourceType::NS => "NS",
        DNSResourceType::CNAME => "CNAME",
        DNSResourceType::SOA => "SOA",
        DNSResourceType::MX => "MX",
        DNSResourceType::TXT => "TXT",
        DNSResourceType::SRV => "SRV",
        DNSResourceType::SVCB => "SVCB",
        DNSResourceType::DS => "DS",
        DNSResourceType::DNSKEY => "DNSKEY",
        DNSResourceType::RRSIG => "RRSIG",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::dns::enums::{DNSResourceClass, ResponseCode};
    use crate::dns::resource::DNSResource;
    use crate::dnssec::TrustAnchorStore;
    use crate::model::RRset;
    use std::time::Instant;

    fn dispatcher() -> Dispatcher {
        let ctx = ResolverContext::new(ResolverConfig::default(), Arc::new(TrustAnchorStore::new()));
        Dispatcher::new(Arc::new(ctx))
    }

    fn a_record(name: &str) -> DNSResource {
        DNSResource {
            labels: name.split('.').map(String::from).collect(),
            rtype: DNSResourceType::A,
            rclass: DNSResourceClass::IN,
            ttl: 300,
            rdlength: 4,
            rdata: vec![127, 0, 0, 1],
            parsed_rdata: Some("127.0.0.1".to_string()),
            raw_class: None,
        }
    }

    #[tokio::test]
    async fn resolve_returns_cached_answer_without_resolving() {
        let dispatcher = dispatcher();
        let mut rrset = RRset::new("cached.example.com".into(), DNSResourceClass::IN, DNSResourceType::A);
        rrset.push(a_record("cached.example.com"));
        dispatcher.ctx.rrset_cache.set(
            "cached.example.com",
            DNSResourceType::A,
            CachedRRset {
                rcode: ResponseCode::NoError,
                rrset: Some(rrset),
                neg_authority: None,
                context: Context::Answer,
                state: ValidationState::Secure,
                expiration: Instant::now() + std::time::Duration::from_secs(60),
                ede: None,
            },
        );

        let outcome = dispatcher.resolve("cached.example.com", DNSResourceType::A).await;
        assert_eq!(outcome.rcode, ResponseCode::NoError);
        assert_eq!(outcome.state, ValidationState::Secure);
        assert!(outcome.rrset.is_some());
    }

    #[test]
    fn qtype_label_covers_common_types() {
        assert_eq!(qtype_label(DNSResourceType::A), "A");
        assert_eq!(qtype_label(DNSResourceType::TXT), "TXT");
    }
}
