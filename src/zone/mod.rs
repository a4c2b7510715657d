pub mod zone_map;

pub use zone_map::ZoneMap;
