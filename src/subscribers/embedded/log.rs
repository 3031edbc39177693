//! # LogWriter: structured event logger
//!
//! A minimal subscriber that forwards incoming [`Event`]s to `tracing`.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG tasktree: spawned task="loader" id=#3 parent=Some(#1) priority="medium"
//!  INFO tasktree: succeeded task="loader" id=#3
//!  WARN tasktree: failed task="fetch" id=#4 err="execution failed: boom"
//!  INFO tasktree: cancelled task="poll" id=#5
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::TaskSpawned => {
                tracing::debug!(
                    target: "tasktree",
                    task, id = ?e.task_id, parent = ?e.parent,
                    priority = e.priority.map(|p| p.as_label()),
                    "spawned"
                );
            }
            EventKind::TaskStarting => {
                tracing::debug!(target: "tasktree", task, id = ?e.task_id, "starting");
            }
            EventKind::TaskSucceeded => {
                tracing::info!(target: "tasktree", task, id = ?e.task_id, "succeeded");
            }
            EventKind::TaskFailed => {
                tracing::warn!(target: "tasktree", task, id = ?e.task_id, err = reason, "failed");
            }
            EventKind::TaskCancelled => {
                tracing::info!(target: "tasktree", task, id = ?e.task_id, "cancelled");
            }
            EventKind::CancelRequested => {
                tracing::debug!(target: "tasktree", task, id = ?e.task_id, "cancel-requested");
            }
            EventKind::SpawnRejected => {
                tracing::warn!(target: "tasktree", task, parent = ?e.parent, reason, "spawn-rejected");
            }
            EventKind::TimeoutHit => {
                tracing::warn!(target: "tasktree", task, timeout_ms = ?e.timeout_ms, "timeout");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "tasktree", "shutdown-requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: "tasktree", "all-stopped-within-grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(target: "tasktree", "grace-exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "tasktree", subscriber = task, reason, "subscriber-overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "tasktree", subscriber = task, info = reason, "subscriber-panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
