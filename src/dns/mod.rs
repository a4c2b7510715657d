pub mod common;
pub mod constants;
pub mod edns;
pub mod enums;
mod error;
pub mod header;
pub mod packet;
pub mod question;
pub mod resource;
pub mod unified_parser;

#[cfg(test)]
mod compression_tests;

pub use common::PacketComponent;
pub use edns::{EdnsOpt, EdnsOption, EdnsOptionCode};
pub use error::ParseError;
pub use header::DNSHeader;
pub use packet::DNSPacket;
pub use question::DNSQuestion;
pub use resource::DNSResource;
pub use unified_parser::UnifiedDnsParser;
