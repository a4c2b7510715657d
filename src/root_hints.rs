use std::net::IpAddr;

/// Embedded default root hints (IANA root-servers.net, IPv4 only). Used
/// unless `ResolverConfig::root_hints_path` names a file to load instead
/// (§6.4).
pub const ROOT_SERVERS: &[(&str, &str)] = &[
    ("a.root-servers.net", "198.41.0.4"),
    ("b.root-servers.net", "170.247.170.2"),
    ("c.root-servers.net", "192.33.4.12"),
    ("d.root-servers.net", "199.7.91.13"),
    ("e.root-servers.net", "192.203.230.10"),
    ("f.root-servers.net", "192.5.5.241"),
    ("g.root-servers.net", "192.112.36.4"),
    ("h.root-servers.net", "198.97.190.53"),
    ("i.root-servers.net", "192.36.148.17"),
    ("j.root-servers.net", "192.58.128.30"),
    ("k.root-servers.net", "193.0.14.129"),
    ("l.root-servers.net", "199.7.83.42"),
    ("m.root-servers.net", "202.12.27.33"),
];

/// Seed the root zone's `AuthServer`s into the registry and zone map, with
/// `src = Hint` and `conn_mode = Legacy` (§4.7.1 step 2 fallback).
pub fn seed_roots(ctx: &crate::context::ResolverContext) {
    let root_zone = ctx.zone_map.get_or_create(".");
    for (name, addr) in ROOT_SERVERS {
        let server = ctx.auth_servers.get_or_create(name);
        if let Ok(ip) = addr.parse::<IpAddr>() {
            server.add_addr(ip);
        }
        root_zone.add_ns_name((*name).to_string());
    }
    root_zone.set_state(crate::model::ValidationState::Indeterminate);
}
