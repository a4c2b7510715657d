use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::backoff::AddressBackoff;
use super::transport::{ConnMode, Transport};

/// Where an `AuthServer` entry was learned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Answer,
    Referral,
    Priming,
    Hint,
    Unknown,
}

/// Per-transport exchange counters, grounded on the teacher's
/// `ServerHealth`/`ServerStats` bookkeeping.
#[derive(Debug, Default)]
pub struct TransportCounters {
    pub attempts: AtomicU64,
    pub successes: AtomicU64,
}

impl TransportCounters {
    pub fn record(&self, success: bool) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Mutable fields of an `AuthServer`, serialized by a single per-server lock
/// (§3.8).
#[derive(Debug)]
struct Mutable {
    addrs: Vec<IpAddr>,
    alpn: Vec<String>,
    transports: Vec<Transport>,
    transport_weights: std::collections::HashMap<Transport, u8>,
    preferred_transport: Option<Transport>,
    conn_mode: ConnMode,
    expire: Option<Instant>,
}

/// A nameserver, shared across every zone that delegates to it. Exactly one
/// instance per name across the process (§3.5); per-zone maps hold
/// references, never copies.
#[derive(Debug)]
pub struct AuthServer {
    pub name: String,
    pub src: Source,
    mutable: RwLock<Mutable>,
    pub address_backoffs: DashMap<IpAddr, AddressBackoff>,
    pub transport_counters: DashMap<Transport, TransportCounters>,
}

impl AuthServer {
    pub fn new(name: String, src: Source) -> Self {
        Self {
            name,
            src,
            mutable: RwLock::new(Mutable {
                addrs: Vec::new(),
                alpn: Vec::new(),
                transports: vec![Transport::Do53],
                transport_weights: std::collections::HashMap::new(),
                preferred_transport: None,
                conn_mode: ConnMode::default(),
                expire: None,
            }),
            address_backoffs: DashMap::new(),
            transport_counters: DashMap::new(),
        }
    }

    pub fn addrs(&self) -> Vec<IpAddr> {
        self.mutable.read().addrs.clone()
    }

    pub fn add_addr(&self, addr: IpAddr) {
        let mut m = self.mutable.write();
        if !m.addrs.contains(&addr) {
            m.addrs.push(addr);
        }
    }

    pub fn set_expire(&self, at: Instant) {
        self.mutable.write().expire = Some(at);
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.mutable.read().expire, Some(at) if now >= at)
    }

    /// Addresses not currently backed off, in registration order.
    pub fn available_addresses(&self) -> Vec<IpAddr> {
        self.addrs()
            .into_iter()
            .filter(|addr| {
                self.address_backoffs
                    .get(addr)
                    .map(|b| b.is_available())
                    .unwrap_or(true)
            })
            .collect()
    }

    pub fn record_address_success(&self, addr: IpAddr) {
        self.address_backoffs
            .entry(addr)
            .or_insert_with(AddressBackoff::new)
            .record_success();
    }

    pub fn record_address_failure(&self, addr: IpAddr) {
        self.address_backoffs
            .entry(addr)
            .or_insert_with(AddressBackoff::new)
            .record_failure();
    }

    pub fn conn_mode(&self) -> ConnMode {
        self.mutable.read().conn_mode
    }

    /// Monotonic promotion — never regresses an existing `conn_mode`.
    pub fn promote_conn_mode(&self, mode: ConnMode) {
        self.mutable.write().conn_mode.promote(mode);
    }

    pub fn transports(&self) -> Vec<Transport> {
        self.mutable.read().transports.clone()
    }

    pub fn transport_weight(&self, transport: Transport) -> u8 {
        self.mutable
            .read()
            .transport_weights
            .get(&transport)
            .copied()
            .unwrap_or(0)
    }

    pub fn preferred_transport(&self) -> Option<Transport> {
        self.mutable.read().preferred_transport
    }

    pub fn set_alpn(&self, alpn: Vec<String>) {
        self.mutable.write().alpn = alpn;
    }

    pub fn alpn(&self) -> Vec<String> {
        self.mutable.read().alpn.clone()
    }

    /// Apply a parsed transport signal: merges transports/weights, and
    /// promotes `conn_mode` if the signal's source warrants it (§4.9).
    pub fn apply_transport_signal(
        &self,
        transports: Vec<Transport>,
        weights: std::collections::HashMap<Transport, u8>,
        promote_to: ConnMode,
    ) {
        let mut m = self.mutable.write();
        m.transports = transports;
        m.transport_weights = weights;
        drop(m);
        self.promote_conn_mode(promote_to);
    }

    pub fn record_exchange(&self, transport: Transport, success: bool) {
        self.transport_counters
            .entry(transport)
            .or_default()
            .record(success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conn_mode_promotion_never_regresses() {
        let server = AuthServer::new("ns1.example.com".into(), Source::Referral);
        server.promote_conn_mode(ConnMode::Validated);
        server.promote_conn_mode(ConnMode::Opportunistic);
        assert_eq!(server.conn_mode(), ConnMode::Validated);
    }

    #[test]
    fn available_addresses_excludes_backed_off() {
        let server = AuthServer::new("ns1.example.com".into(), Source::Referral);
        let a: IpAddr = "192.0.2.1".parse().unwrap();
        let b: IpAddr = "192.0.2.2".parse().unwrap();
        server.add_addr(a);
        server.add_addr(b);
        server.record_address_failure(a);
        assert_eq!(server.available_addresses(), vec![b]);
    }
}
