//! # Per-spawn options.
//!
//! [`SpawnOptions`] overrides the name and priority of a new task. Unset
//! fields fall back to defaults:
//! - name → `task-<id>`
//! - priority → the parent's priority (children) or
//!   [`SchedulerConfig::default_priority`](crate::SchedulerConfig::default_priority) (roots)

use std::borrow::Cow;

use crate::tasks::Priority;

/// Name/priority overrides for a new task.
///
/// ## Example
/// ```rust
/// use tasktree::{Priority, SpawnOptions};
///
/// let opts = SpawnOptions::named("loader").with_priority(Priority::High);
/// assert_eq!(opts.name(), Some("loader"));
/// assert_eq!(opts.priority(), Some(Priority::High));
/// ```
#[derive(Clone, Debug, Default)]
pub struct SpawnOptions {
    name: Option<Cow<'static, str>>,
    priority: Option<Priority>,
}

impl SpawnOptions {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with only a name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new().with_name(name)
    }

    /// Returns new options with the given name.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns new options with the given priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Returns the name override, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the priority override, if any.
    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }
}
