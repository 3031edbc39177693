use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for task identities.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a task.
///
/// Ids are allocated monotonically and never reused within a process, so a
/// child can refer to its parent by id without keeping it alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocates the next id.
    pub(crate) fn next() -> Self {
        TaskId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        TaskId(raw)
    }

    /// Returns the raw numeric id.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
