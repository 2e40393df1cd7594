use crate::counters::SparseCounter;
use crate::MAX_COUNTERS;

/// Per-group state shared by every evaluator context running the group's
/// computation.
///
/// The engine treats the context as an opaque bag; only built-in functional
/// nodes interpret it. All fields are safe to touch from concurrent packet
/// contexts.
#[derive(Debug)]
pub struct GroupContext {
    counters: Vec<SparseCounter>,
}

impl GroupContext {
    /// Context with the full counter slab zeroed.
    pub fn new() -> Self {
        Self {
            counters: (0..MAX_COUNTERS).map(|_| SparseCounter::new()).collect(),
        }
    }

    /// Counter at `idx`, or `None` when the index is out of range.
    pub fn counter(&self, idx: usize) -> Option<&SparseCounter> {
        self.counters.get(idx)
    }
}

impl Default for GroupContext {
    fn default() -> Self {
        Self::new()
    }
}
