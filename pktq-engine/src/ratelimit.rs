//! Source-side rate limiting for packet-path log events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Allows one event per interval; callers skip emission when `check` is
/// false. Contended updates lose the race and stay silent, which is the
/// point.
#[derive(Debug)]
pub(crate) struct RateLimit {
    interval_ms: u64,
    next: AtomicU64,
}

impl RateLimit {
    pub(crate) const fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            next: AtomicU64::new(0),
        }
    }

    pub(crate) fn check(&self) -> bool {
        let now = epoch().elapsed().as_millis() as u64;
        let next = self.next.load(Ordering::Relaxed);
        if now < next {
            return false;
        }
        self.next
            .compare_exchange(next, now + self.interval_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}
