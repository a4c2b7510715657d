//! End-to-end scenarios against real servers. Mirrors the teacher's own
//! `#[ignore]`d network tests (e.g. `dnssec_e2e_test.rs`,
//! `failover_backoff_test.rs`) — these hit the live internet and DNS root
//! system, so they're excluded from the default test run.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use resolvd::config::ResolverConfig;
use resolvd::context::ResolverContext;
use resolvd::dns::enums::DNSResourceType;
use resolvd::dnssec::TrustAnchorStore;
use resolvd::model::{CachedRRset, Context};
use resolvd::root_hints;
use resolvd::Dispatcher;
use tokio::time::timeout;

fn context_with_roots() -> Arc<ResolverContext> {
    let ctx = Arc::new(ResolverContext::new(
        ResolverConfig::default(),
        Arc::new(TrustAnchorStore::new()),
    ));
    root_hints::seed_roots(&ctx);
    ctx
}

#[tokio::test]
#[ignore] // requires network access
async fn resolves_a_well_known_domain_from_the_root() {
    let ctx = context_with_roots();
    let dispatcher = Dispatcher::new(ctx);

    let outcome = timeout(
        Duration::from_secs(15),
        dispatcher.resolve("example.com", DNSResourceType::A),
    )
    .await
    .expect("resolution should not time out");

    assert_eq!(outcome.rcode, resolvd::dns::enums::ResponseCode::NoError);
    let rrset = outcome.rrset.expect("should have an A RRset");
    assert!(!rrset.records.is_empty());
}

#[tokio::test]
#[ignore] // requires network access
async fn failed_server_gets_backed_off_and_a_working_one_answers() {
    // A stub zone listing an unreachable address ahead of a real recursive
    // resolver. Mirrors S4 (lame delegation): the first address should be
    // skipped via backoff after failing, and the second should answer.
    let ctx = Arc::new(ResolverContext::new(
        ResolverConfig::default(),
        Arc::new(TrustAnchorStore::new()),
    ));
    let unreachable: SocketAddr = "192.0.2.1:53".parse().unwrap();
    let working: SocketAddr = "1.1.1.1:53".parse().unwrap();
    ctx.seed_stub_zone("com", &[unreachable, working]);

    let dispatcher = Dispatcher::new(ctx);
    let outcome = timeout(
        Duration::from_secs(15),
        dispatcher.resolve("example.com", DNSResourceType::A),
    )
    .await
    .expect("resolution should not time out");

    assert_eq!(outcome.rcode, resolvd::dns::enums::ResponseCode::NoError);
    assert!(outcome.rrset.is_some());
}

#[tokio::test]
#[ignore] // requires network access
async fn negative_answer_is_cached_as_caller_visible() {
    let ctx = context_with_roots();
    let dispatcher = Dispatcher::new(ctx.clone());

    let name = "definitely-does-not-exist-resolvd-test.example.";
    let outcome = timeout(
        Duration::from_secs(15),
        dispatcher.resolve(name, DNSResourceType::A),
    )
    .await
    .expect("resolution should not time out");

    assert_eq!(outcome.rcode, resolvd::dns::enums::ResponseCode::NameError);

    let cached: Option<CachedRRset> = ctx.rrset_cache.get(name, DNSResourceType::A);
    let cached = cached.expect("negative answer should be cached");
    assert_eq!(cached.context, Context::NXDomain);
    assert!(cached.is_caller_visible());
}
