pub mod authserver;
pub mod backoff;
pub mod dnskey;
pub mod rrset;
pub mod transport;
pub mod zone;

pub use authserver::{AuthServer, Source};
pub use backoff::AddressBackoff;
pub use dnskey::CachedDnskey;
pub use rrset::{CachedRRset, Context, ExtendedError, RRset, ValidationState};
pub use transport::{ConnMode, Transport};
pub use zone::Zone;
