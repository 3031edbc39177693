//! # Scheduler configuration.
//!
//! Provides [`SchedulerConfig`] centralized settings for the scheduler.
//!
//! ## Sentinel values
//! - `max_concurrent_roots = 0` → unlimited (no admission gate created)
//! - `bus_capacity = 0` → clamped to 1
//! - `aging_step = 0` → clamped to 1

use std::time::Duration;

use crate::tasks::Priority;

/// What happens when a child is spawned under a parent that is cancelling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CancelledSpawn {
    /// The child is registered and terminates `cancelled` without running its body.
    #[default]
    BornCancelled,
    /// The spawn fails with [`TaskError::InvalidParentState`](crate::TaskError::InvalidParentState).
    Reject,
}

/// Global configuration for the scheduler.
///
/// ## Field semantics
/// - `grace`: Maximum wait in [`Scheduler::shutdown`](crate::Scheduler::shutdown)
/// - `max_concurrent_roots`: Root task trees running at once (`0` = unlimited)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `default_priority`: Priority of roots spawned without an override
/// - `aging_step`: How many times a waiting root may be overtaken before it is promoted one level
/// - `cancelled_spawn`: Behavior of spawns under a cancelling parent
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum time to wait for every task to stop during shutdown.
    pub grace: Duration,

    /// Maximum number of root tasks whose bodies run concurrently.
    ///
    /// Children never wait for admission: a tree is admitted as a whole, so a
    /// parent waiting on its children cannot deadlock the gate.
    pub max_concurrent_roots: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Priority given to roots spawned without an explicit priority.
    pub default_priority: Priority,

    /// Number of times a waiting root can be overtaken before being promoted.
    pub aging_step: usize,

    /// Spawn behavior under a cancelling parent.
    pub cancelled_spawn: CancelledSpawn,
}

impl SchedulerConfig {
    /// Returns the root concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no gate)
    /// - `Some(n)` → at most `n` roots run at once
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent_roots == 0 {
            None
        } else {
            Some(self.max_concurrent_roots)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the aging step clamped to a minimum of 1.
    #[inline]
    pub fn aging_step_clamped(&self) -> usize {
        self.aging_step.max(1)
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `max_concurrent_roots = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `default_priority = Priority::Medium`
    /// - `aging_step = 4`
    /// - `cancelled_spawn = CancelledSpawn::BornCancelled`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            max_concurrent_roots: 0,
            bus_capacity: 1024,
            default_priority: Priority::Medium,
            aging_step: 4,
            cancelled_spawn: CancelledSpawn::default(),
        }
    }
}
