use dashmap::DashMap;

/// A single TLSA association (RFC 6698 §2.1), as discovered either from a
/// direct TLSA lookup or from SVCB parameters carried in a transport signal
/// (§4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsaRecord {
    pub cert_usage: u8,
    pub selector: u8,
    pub matching_type: u8,
    pub data: Vec<u8>,
}

/// Store of TLSA associations, keyed by `_port._proto.name`, used to pin DoT
/// certificates when a nameserver advertises them.
pub struct TlsaStore {
    entries: DashMap<String, Vec<TlsaRecord>>,
}

impl Default for TlsaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsaStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Vec<TlsaRecord>> {
        self.entries.get(&name.to_ascii_lowercase()).map(|v| v.clone())
    }

    pub fn set(&self, name: &str, records: Vec<TlsaRecord>) {
        self.entries.insert(name.to_ascii_lowercase(), records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let store = TlsaStore::new();
        let records = vec![TlsaRecord {
            cert_usage: 3,
            selector: 1,
            matching_type: 1,
            data: vec![0xab; 32],
        }];
        store.set("_853._tcp.ns1.Example.com", records.clone());
        assert_eq!(store.get("_853._tcp.ns1.example.com"), Some(records));
    }
}
