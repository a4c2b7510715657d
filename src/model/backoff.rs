use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const BASE_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Per-address failure backoff (§3.6). Successes clear it; failures double
/// the wait up to a five-minute ceiling, grounded on the teacher's
/// `ServerHealth::should_retry_health_check` exponential-backoff shape.
#[derive(Debug)]
pub struct AddressBackoff {
    consecutive_failures: AtomicU32,
    next_available_at_millis: AtomicU64,
    epoch: Instant,
}

impl Default for AddressBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressBackoff {
    pub fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            next_available_at_millis: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Whether this address may be tried right now.
    pub fn is_available(&self) -> bool {
        let next = self.next_available_at_millis.load(Ordering::Relaxed);
        next == 0 || self.epoch.elapsed().as_millis() as u64 >= next
    }

    /// Clear backoff on success.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.next_available_at_millis.store(0, Ordering::Relaxed);
    }

    /// Register a failure and schedule the next retry.
    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        let backoff = BASE_BACKOFF
            .saturating_mul(1u32 << failures.min(12))
            .min(MAX_BACKOFF);
        let at = self.epoch.elapsed().as_millis() as u64 + backoff.as_millis() as u64;
        self.next_available_at_millis.store(at, Ordering::Relaxed);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_available() {
        let b = AddressBackoff::new();
        assert!(b.is_available());
    }

    #[test]
    fn failure_makes_unavailable_then_success_clears() {
        let b = AddressBackoff::new();
        b.record_failure();
        assert!(!b.is_available());
        b.record_success();
        assert!(b.is_available());
        assert_eq!(b.consecutive_failures(), 0);
    }
}
