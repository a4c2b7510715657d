use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;

use crate::dns::enums::ResponseCode;
use crate::model::{AuthServer, ConnMode, Source};

/// Whether an exchange failure belongs to the server-wide backoff counter
/// (a transport-level problem, the address itself is unreachable) or the
/// zone-specific one (the address answered but refused to be authoritative
/// for this particular zone) (§3.6, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Authority(ResponseCode),
}

impl FailureKind {
    fn is_zone_specific(self) -> bool {
        matches!(
            self,
            FailureKind::Authority(
                ResponseCode::Refused
                    | ResponseCode::NotAuth
                    | ResponseCode::NotImplemented
                    | ResponseCode::ServerFailure
            )
        )
    }
}

/// The shared table of `AuthServer` instances, keyed by nameserver name.
/// Exactly one instance per name across the process (§3.5, §4.4).
pub struct AuthServerRegistry {
    servers: DashMap<String, Arc<AuthServer>>,
}

impl Default for AuthServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthServerRegistry {
    pub fn new() -> Self {
        Self {
            servers: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<AuthServer> {
        let key = name.to_ascii_lowercase();
        self.servers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AuthServer::new(key, Source::Unknown)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<AuthServer>> {
        self.servers.get(&name.to_ascii_lowercase()).map(|s| s.clone())
    }

    /// Addresses of `server` whose server-wide backoff has elapsed,
    /// additionally filtered against the zone-specific backoff held on
    /// `zone` if one is supplied.
    pub fn available_addresses(
        &self,
        server: &AuthServer,
        zone: Option<&crate::model::Zone>,
    ) -> Vec<IpAddr> {
        server
            .available_addresses()
            .into_iter()
            .filter(|addr| zone.map(|z| z.is_address_available(*addr)).unwrap_or(true))
            .collect()
    }

    pub fn record_address_success(
        &self,
        server: &AuthServer,
        zone: Option<&crate::model::Zone>,
        addr: IpAddr,
        kind: FailureKind,
    ) {
        if kind.is_zone_specific() {
            if let Some(zone) = zone {
                zone.record_address_success(addr);
            }
        } else {
            server.record_address_success(addr);
        }
    }

    pub fn record_address_failure(
        &self,
        server: &AuthServer,
        zone: Option<&crate::model::Zone>,
        addr: IpAddr,
        kind: FailureKind,
    ) {
        if kind.is_zone_specific() {
            if let Some(zone) = zone {
                zone.record_address_failure(addr);
                return;
            }
        }
        server.record_address_failure(addr);
    }

    pub fn promote_conn_mode(&self, server: &AuthServer, target: ConnMode) {
        server.promote_conn_mode(target);
    }

    /// Parse and apply a weighted transport string (§6.3/§4.9). Accepts a
    /// bare weighted-transport list, a `transport=...` value, or an
    /// `alpn=...` value (SVCB ALPN fallback when no "transport" key is
    /// present — each token implies weight 100). Returns `true` if at least
    /// one valid entry was applied.
    pub fn apply_transport_string(&self, server: &AuthServer, value: &str, promote_to: ConnMode) -> bool {
        if let Some(alpn) = value.strip_prefix("alpn=") {
            let tokens: Vec<String> = alpn
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            let parsed = crate::transport_signal::transports_from_alpn(&tokens);
            if parsed.is_empty() {
                return false;
            }
            let transports = parsed.iter().map(|(t, _)| *t).collect();
            let weights = parsed.into_iter().collect();
            server.set_alpn(tokens);
            server.apply_transport_signal(transports, weights, promote_to);
            return true;
        }

        let parsed = crate::transport_signal::parse_weighted_transports(value);
        if parsed.is_empty() {
            return false;
        }
        let transports = parsed.iter().map(|(t, _)| *t).collect();
        let weights = parsed.into_iter().collect();
        server.apply_transport_signal(transports, weights, promote_to);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_shared_instance() {
        let registry = AuthServerRegistry::new();
        let a = registry.get_or_create("ns1.example.com");
        let b = registry.get_or_create("NS1.example.com");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn zone_specific_failure_does_not_touch_server_backoff() {
        let registry = AuthServerRegistry::new();
        let server = registry.get_or_create("ns1.example.com");
        let zone = crate::model::Zone::new("example.com".into());
        let addr: IpAddr = "192.0.2.1".parse().unwrap();
        server.add_addr(addr);

        registry.record_address_failure(
            &server,
            Some(&zone),
            addr,
            FailureKind::Authority(ResponseCode::Refused),
        );

        assert!(server.available_addresses().contains(&addr));
        assert!(!zone.is_address_available(addr));
    }

    #[test]
    fn transport_failure_hits_server_wide_backoff() {
        let registry = AuthServerRegistry::new();
        let server = registry.get_or_create("ns1.example.com");
        let addr: IpAddr = "192.0.2.1".parse().unwrap();
        server.add_addr(addr);

        registry.record_address_failure(&server, None, addr, FailureKind::Transport);

        assert!(!server.available_addresses().contains(&addr));
    }

    #[test]
    fn alpn_signal_sets_alpn_and_derives_full_weight_transports() {
        let registry = AuthServerRegistry::new();
        let server = registry.get_or_create("ns1.example.com");

        let applied = registry.apply_transport_string(&server, "alpn=dot,h2", ConnMode::Opportunistic);

        assert!(applied);
        assert_eq!(server.alpn(), vec!["dot".to_string(), "h2".to_string()]);
        assert_eq!(server.transport_weight(crate::model::Transport::DoT), 100);
        assert_eq!(server.transport_weight(crate::model::Transport::DoH), 100);
    }

    #[test]
    fn transport_signal_promotes_to_validated_when_requested() {
        let registry = AuthServerRegistry::new();
        let server = registry.get_or_create("ns1.example.com");

        registry.apply_transport_string(&server, "dot=100", ConnMode::Validated);

        assert_eq!(server.conn_mode(), ConnMode::Validated);
    }
}
