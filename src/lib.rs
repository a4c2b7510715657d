pub mod authserver;
pub mod cache;
pub mod config;
pub mod constants;
pub mod context;
pub mod dispatcher;
pub mod dns;
pub mod dnssec;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod root_hints;
pub mod tlsa;
pub mod transport_signal;
pub mod wire;
pub mod zone;

pub use context::ResolverContext;
pub use dispatcher::Dispatcher;
pub use dns::DNSPacket;
pub use error::{ResolverError, Result};
