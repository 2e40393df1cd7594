use core::sync::atomic::{AtomicI64, Ordering};

/// Counter shared by concurrent evaluator contexts.
///
/// Updates are relaxed: counters are advisory statistics and impose no
/// ordering on the packet path.
#[derive(Debug, Default)]
pub struct SparseCounter(AtomicI64);

impl SparseCounter {
    /// Counter starting at zero.
    pub const fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement by one.
    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    /// Current value.
    pub fn read(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}
