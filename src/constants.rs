pub const MAX_UDP_PACKET_SIZE: usize = 512;
pub const EDNS_VERSION: u8 = 0;
pub const EDNS_UDP_SIZE: u16 = 4096;
