//! # Task priority.
//!
//! [`Priority`] is an **advisory** hint. It never affects correctness:
//! - children inherit their parent's priority unless overridden;
//! - root tasks are admitted highest-priority first when the scheduler has a
//!   concurrency limit (see [`SchedulerConfig::max_concurrent_roots`](crate::SchedulerConfig::max_concurrent_roots));
//! - waiting roots are promoted over time, so low priorities never starve.

/// Ordered priority levels, lowest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    /// Maintenance work nobody waits for.
    Background,
    /// Prefetching, speculative work.
    Low,
    /// Default level.
    #[default]
    Medium,
    /// Work a user is waiting on.
    High,
    /// Work that must be admitted before anything else.
    Critical,
}

impl Priority {
    /// Returns the next higher level (saturates at [`Priority::Critical`]).
    ///
    /// ```
    /// use tasktree::Priority;
    ///
    /// assert_eq!(Priority::Low.promote(), Priority::Medium);
    /// assert_eq!(Priority::Critical.promote(), Priority::Critical);
    /// ```
    pub fn promote(self) -> Self {
        match self {
            Priority::Background => Priority::Low,
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High | Priority::Critical => Priority::Critical,
        }
    }

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Priority::Background => "background",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}
