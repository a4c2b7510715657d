use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::{DnskeyCache, RRsetCache};
use crate::config::ResolverConfig;
use crate::dnssec::{DnsSecValidator, TrustAnchorStore};
use crate::metrics::ResolverMetrics;
use crate::model::AuthServer;
use crate::tlsa::TlsaStore;
use crate::wire::WireClientPool;
use crate::zone::ZoneMap;

/// The value graph a resolve walks through: every shared component, bundled
/// once at startup (§9 Design Notes — no process-wide globals; everything
/// reachable hangs off this struct). Grounded on the teacher's `DnsResolver`
/// struct shape in `resolver.rs`, which bundles its cache/connection-pool/
/// metrics fields the same way.
pub struct ResolverContext {
    pub config: ResolverConfig,
    pub rrset_cache: RRsetCache,
    pub dnskey_cache: Arc<DnskeyCache>,
    pub zone_map: ZoneMap,
    pub auth_servers: crate::authserver::registry::AuthServerRegistry,
    pub wire: WireClientPool,
    pub tlsa: TlsaStore,
    pub validator: DnsSecValidator,
    pub metrics: ResolverMetrics,
}

impl ResolverContext {
    pub fn new(config: ResolverConfig, trust_anchors: Arc<TrustAnchorStore>) -> Self {
        let dnskey_cache = Arc::new(DnskeyCache::new());
        Self {
            config,
            rrset_cache: RRsetCache::new(),
            dnskey_cache: dnskey_cache.clone(),
            zone_map: ZoneMap::new(),
            auth_servers: crate::authserver::registry::AuthServerRegistry::new(),
            wire: WireClientPool::new(),
            tlsa: TlsaStore::new(),
            validator: DnsSecValidator::new(trust_anchors, dnskey_cache),
            metrics: ResolverMetrics::new(),
        }
    }

    /// Seed a stub zone's servers into the Zone Map and Auth-Server
    /// Registry at startup (§6.4).
    pub fn seed_stub_zone(&self, zone: &str, servers: &[std::net::SocketAddr]) {
        let zone_entry = self.zone_map.get_or_create(zone);
        zone_entry.set_state(crate::model::ValidationState::Indeterminate);
        let server_name = format!("stub.{zone}");
        let auth_server = self.auth_servers.get_or_create(&server_name);
        for addr in servers {
            auth_server.add_addr(addr.ip());
        }
        zone_entry.add_ns_name(server_name);
    }
}

/// A fresh cancellation token for one top-level `resolve` call; child tasks
/// (DNSKEY/DS fetches, CNAME chases, NS revalidation) are given a clone and
/// observe cancellation together (§5).
pub fn new_query_token() -> CancellationToken {
    CancellationToken::new()
}

pub type SharedAuthServer = Arc<AuthServer>;
