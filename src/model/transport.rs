use serde::{Deserialize, Serialize};

/// The closed set of transports a nameserver can be reached over.
/// ALPN tokens map 1:1 (§3.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transport {
    Do53,
    DoT,
    DoH,
    DoQ,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Do53 => "do53",
            Transport::DoT => "dot",
            Transport::DoH => "doh",
            Transport::DoQ => "doq",
        }
    }

    pub fn alpn(self) -> &'static str {
        match self {
            Transport::Do53 => "",
            Transport::DoT => "dot",
            Transport::DoH => "h2",
            Transport::DoQ => "doq",
        }
    }

    pub fn from_alpn(token: &str) -> Option<Self> {
        match token {
            "dot" => Some(Transport::DoT),
            "h2" | "http/1.1" => Some(Transport::DoH),
            "doq" => Some(Transport::DoQ),
            _ => None,
        }
    }
}

impl std::str::FromStr for Transport {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "do53" => Ok(Transport::Do53),
            "dot" => Ok(Transport::DoT),
            "doh" => Ok(Transport::DoH),
            "doq" => Ok(Transport::DoQ),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monotonic trust lattice on how a nameserver's transport was learned.
/// Promotions only: a server never moves backward once it has earned a
/// higher mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum ConnMode {
    #[default]
    Legacy,
    Opportunistic,
    Validated,
    Strict,
}

impl ConnMode {
    /// Promote to `other` if it ranks higher; no-op otherwise.
    pub fn promote(&mut self, other: ConnMode) {
        if other > *self {
            *self = other;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conn_mode_promotes_only_upward() {
        let mut mode = ConnMode::Opportunistic;
        mode.promote(ConnMode::Legacy);
        assert_eq!(mode, ConnMode::Opportunistic);
        mode.promote(ConnMode::Strict);
        assert_eq!(mode, ConnMode::Strict);
    }

    #[test]
    fn transport_roundtrips_through_str() {
        for t in [Transport::Do53, Transport::DoT, Transport::DoH, Transport::DoQ] {
            assert_eq!(t.as_str().parse::<Transport>().unwrap(), t);
        }
    }
}
