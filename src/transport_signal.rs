use crate::model::Transport;

/// Private SVCB key assigned to the "transport" parameter. Chosen from the
/// private-use experimental range (65280-65534) per the Open Question
/// resolution recorded in DESIGN.md.
pub const SVCB_TRANSPORT_KEY: u16 = 65280;

/// Private RR type assigned to TSYNC, distinct from `SVCB_TRANSPORT_KEY` so
/// the two namespaces aren't confused at a glance.
pub const TSYNC_RRTYPE: u16 = 65321;

/// Parse a weighted transport string (§6.3): comma-separated `name[=weight]`
/// entries, name case-insensitive, weight in `0..=100`, bare name meaning
/// weight 100. A leading `transport=` prefix (as used by TSYNC) is stripped
/// first. Unknown names and out-of-range weights are silently discarded.
pub fn parse_weighted_transports(value: &str) -> Vec<(Transport, u8)> {
    let value = value.strip_prefix("transport=").unwrap_or(value);
    let mut out = Vec::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (name, weight) = match token.split_once('=') {
            Some((name, weight)) => match weight.trim().parse::<u16>() {
                Ok(w) if w <= 100 => (name, w as u8),
                _ => continue,
            },
            None => (token, 100u8),
        };
        if let Ok(transport) = name.trim().parse::<Transport>() {
            out.push((transport, weight));
        }
    }
    out
}

/// Derive a weighted transport list from SVCB ALPN tokens when no explicit
/// "transport" key is present: each recognized ALPN implies weight 100.
pub fn transports_from_alpn(alpn: &[String]) -> Vec<(Transport, u8)> {
    alpn.iter()
        .filter_map(|token| Transport::from_alpn(token))
        .map(|t| (t, 100u8))
        .collect()
}

/// Deterministically pick a transport for one exchange attempt given the
/// server's weighted transport table. Uses FNV-32a over a per-exchange
/// nonce so repeated calls for the same nonce are stable but different
/// exchanges are free to redistribute load, per §9 Design Notes.
pub fn select_transport(weights: &[(Transport, u8)], nonce: &[u8]) -> Transport {
    if weights.is_empty() {
        return Transport::Do53;
    }
    let total: u32 = weights.iter().map(|(_, w)| *w as u32).sum::<u32>().max(1);
    let mut hasher = fnv::FnvHasher::default();
    std::hash::Hasher::write(&mut hasher, nonce);
    let point = (std::hash::Hasher::finish(&hasher) as u32) % total;

    let mut acc = 0u32;
    for (transport, weight) in weights {
        acc += *weight as u32;
        if point < acc {
            return *transport;
        }
    }
    weights[0].0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_weighted_entries() {
        let parsed = parse_weighted_transports("dot=80,doh");
        assert_eq!(parsed, vec![(Transport::DoT, 80), (Transport::DoH, 100)]);
    }

    #[test]
    fn strips_tsync_prefix() {
        let parsed = parse_weighted_transports("transport=doq=50");
        assert_eq!(parsed, vec![(Transport::DoQ, 50)]);
    }

    #[test]
    fn discards_unknown_names_and_bad_weights() {
        let parsed = parse_weighted_transports("quic=50,dot=150,doh=30");
        assert_eq!(parsed, vec![(Transport::DoH, 30)]);
    }

    #[test]
    fn alpn_tokens_imply_full_weight() {
        let alpn = vec!["dot".to_string(), "h2".to_string()];
        let parsed = transports_from_alpn(&alpn);
        assert_eq!(parsed, vec![(Transport::DoT, 100), (Transport::DoH, 100)]);
    }

    #[test]
    fn select_transport_is_stable_for_same_nonce() {
        let weights = vec![(Transport::Do53, 50), (Transport::DoT, 50)];
        let a = select_transport(&weights, b"query-1");
        let b = select_transport(&weights, b"query-1");
        assert_eq!(a, b);
    }

    #[test]
    fn select_transport_falls_back_to_do53_when_empty() {
        assert_eq!(select_transport(&[], b"x"), Transport::Do53);
    }
}
