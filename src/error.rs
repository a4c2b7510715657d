use std::net::SocketAddr;
use std::sync::Arc;

use crate::dns::ParseError;

/// Errors produced while resolving a query.
///
/// Grouped the way the wire/transport/validation/engine layers actually fail,
/// so callers can match on a family without inspecting a string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolverError {
    #[error("io error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("malformed dns message: {0}")]
    Parse(#[from] ParseError),

    #[error("config error: {0}")]
    Config(String),

    #[error("transport error talking to {server}: {message}")]
    Transport { server: SocketAddr, message: String },

    #[error("no reachable server for zone {zone}")]
    NoReachableServer { zone: String },

    #[error("protocol error from {server}: {message}")]
    Protocol { server: SocketAddr, message: String },

    #[error("lame delegation: {server} is not authoritative for {zone}")]
    LameDelegation { server: SocketAddr, zone: String },

    #[error("dnssec validation failed for {name} {rtype}: {reason}")]
    ValidationFailure {
        name: String,
        rtype: String,
        reason: String,
    },

    #[error("referral loop detected for {name}")]
    ReferralLoop { name: String },

    #[error("too many cname hops resolving {name}")]
    CnameExcessive { name: String },

    #[error("query cancelled")]
    Cancelled,

    #[error("query timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<std::io::Error> for ResolverError {
    fn from(e: std::io::Error) -> Self {
        ResolverError::Io(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;
