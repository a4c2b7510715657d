pub mod dnskey_cache;
pub mod rrset_cache;

pub use dnskey_cache::DnskeyCache;
pub use rrset_cache::RRsetCache;
