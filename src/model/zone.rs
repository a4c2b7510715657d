use dashmap::DashMap;
use parking_lot::RwLock;

use super::backoff::AddressBackoff;
use super::rrset::ValidationState;

/// A zone's DNSSEC state and per-zone address backoffs (§3.4).
pub struct Zone {
    pub name: String,
    state: RwLock<ValidationState>,
    pub address_backoffs: DashMap<std::net::IpAddr, AddressBackoff>,
    /// Names of the `AuthServer`s (looked up by name in the Auth-Server
    /// Registry) that delegate to this zone.
    ns_names: RwLock<Vec<String>>,
}

impl Zone {
    pub fn new(name: String) -> Self {
        Self {
            name,
            state: RwLock::new(ValidationState::Indeterminate),
            address_backoffs: DashMap::new(),
            ns_names: RwLock::new(Vec::new()),
        }
    }

    pub fn ns_names(&self) -> Vec<String> {
        self.ns_names.read().clone()
    }

    pub fn set_ns_names(&self, names: Vec<String>) {
        *self.ns_names.write() = names;
    }

    pub fn add_ns_name(&self, name: String) {
        let mut names = self.ns_names.write();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    pub fn state(&self) -> ValidationState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ValidationState) {
        *self.state.write() = state;
    }

    pub fn is_address_available(&self, addr: std::net::IpAddr) -> bool {
        self.address_backoffs
            .get(&addr)
            .map(|b| b.is_available())
            .unwrap_or(true)
    }

    pub fn record_address_success(&self, addr: std::net::IpAddr) {
        self.address_backoffs
            .entry(addr)
            .or_insert_with(AddressBackoff::new)
            .record_success();
    }

    pub fn record_address_failure(&self, addr: std::net::IpAddr) {
        self.address_backoffs
            .entry(addr)
            .or_insert_with(AddressBackoff::new)
            .record_failure();
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_indeterminate() {
        let zone = Zone::new("example.com".into());
        assert_eq!(zone.state(), ValidationState::Indeterminate);
    }

    #[test]
    fn state_transitions_are_visible_immediately() {
        let zone = Zone::new("example.com".into());
        zone.set_state(ValidationState::Secure);
        assert_eq!(zone.state(), ValidationState::Secure);
    }
}
