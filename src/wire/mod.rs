pub mod do53;
pub mod doh;
pub mod doq;
pub mod dot;

use std::net::SocketAddr;
use std::time::Duration;

use crate::dns::DNSPacket;
use crate::error::{ResolverError, Result};
use crate::model::Transport;

/// The outcome of one exchange attempt, before the Iterative Engine decides
/// whether to retry or rotate addresses (§4.5: "no retries at this layer").
pub struct Exchange {
    pub reply: DNSPacket,
    pub round_trip: Duration,
}

/// One pooled client per transport, each independently connection-pooling
/// toward upstream addresses. Grounded on the teacher's `ConnectionPool`
/// (`resolver.rs`), which reuses one UDP socket per `SocketAddr` rather than
/// opening a fresh one per query.
pub struct WireClientPool {
    do53: do53::Do53Client,
    dot: dot::DotClient,
    doh: doh::DohClient,
    doq: doq::DoqClient,
}

impl Default for WireClientPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WireClientPool {
    pub fn new() -> Self {
        Self {
            do53: do53::Do53Client::new(),
            dot: dot::DotClient::new(),
            doh: doh::DohClient::new(),
            doq: doq::DoqClient::new(),
        }
    }

    pub async fn exchange(
        &self,
        transport: Transport,
        addr: SocketAddr,
        query: &DNSPacket,
        timeout: Duration,
    ) -> Result<Exchange> {
        let query_bytes = query.serialize()?;
        let started = std::time::Instant::now();
        let reply = match transport {
            Transport::Do53 => self.do53.exchange(&query_bytes, addr, timeout).await?,
            Transport::DoT => self.dot.exchange(&query_bytes, addr, timeout).await?,
            Transport::DoH => self.doh.exchange(&query_bytes, addr, timeout).await?,
            Transport::DoQ => self.doq.exchange(&query_bytes, addr, timeout).await?,
        };
        Ok(Exchange {
            reply,
            round_trip: started.elapsed(),
        })
    }
}

pub(crate) fn transport_error(addr: SocketAddr, message: impl Into<String>) -> ResolverError {
    ResolverError::Transport {
        server: addr,
        message: message.into(),
    }
}
