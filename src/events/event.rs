//! # Runtime events emitted by the scheduler and its tasks.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: task tree flow (spawned, starting, succeeded, failed, cancelled)
//! - **Control events**: cancellation requests, rejected spawns, timeouts
//! - **Runtime events**: shutdown and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task
//! identity, parent, priority and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use tasktree::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("loader")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("loader"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::{Priority, TaskId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// [`Scheduler::shutdown`](crate::Scheduler::shutdown) was called.
    ShutdownRequested,

    /// Every task stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some tasks did not stop in time.
    GraceExceeded,

    // === Task lifecycle events ===
    /// Task registered in the tree.
    ///
    /// Sets:
    /// - `task`, `task_id`, `priority`
    /// - `parent`: parent id (children only)
    TaskSpawned,

    /// Task body is about to run.
    ///
    /// Sets: `task`, `task_id`
    TaskStarting,

    /// Task finished with a value (children included).
    ///
    /// Sets: `task`, `task_id`
    TaskSucceeded,

    /// Task finished with an error.
    ///
    /// Sets:
    /// - `task`, `task_id`, `parent`
    /// - `reason`: error message
    TaskFailed,

    /// Task terminated as cancelled.
    ///
    /// Sets: `task`, `task_id`
    TaskCancelled,

    // === Control events ===
    /// Cancellation requested for a task (first request only).
    ///
    /// Sets: `task`, `task_id`
    CancelRequested,

    /// A child could not be attached to its parent.
    ///
    /// Sets:
    /// - `task`: name the child would have had
    /// - `parent`: the refusing parent
    /// - `reason`: rejection reason
    SpawnRejected,

    /// A timed task lost the race against its timer.
    ///
    /// Sets: `task`, `timeout_ms`
    TimeoutHit,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Identity of the task, if applicable.
    pub task_id: Option<TaskId>,
    /// Parent of the task, if it has one.
    pub parent: Option<TaskId>,
    /// Priority of the task.
    pub priority: Option<Priority>,
    /// Human-readable reason (errors, rejection details, etc.).
    pub reason: Option<Arc<str>>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            parent: None,
            priority: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task identity.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches the parent identity (no-op for roots).
    #[inline]
    pub fn with_parent(mut self, parent: Option<TaskId>) -> Self {
        self.parent = parent;
        self
    }

    /// Attaches a priority.
    #[inline]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// True for the three terminal task events.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskSucceeded | EventKind::TaskFailed | EventKind::TaskCancelled
        )
    }
}
