//! # Task completion state.
//!
//! ```text
//! Pending ──► Running ──► Succeeded
//!    │            ├─────► Failed(error)
//!    │            └─────► Cancelled
//!    └──────────────────► Cancelled   (cancelled before the body started)
//! ```
//!
//! Terminal states are final. Suspension inside `Running` is not observable.

use crate::error::TaskError;

/// Externally observable state of a task.
///
/// The success value itself lives in the typed [`TaskHandle`](crate::TaskHandle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Created, body not started (waiting for launch or admission).
    Pending,
    /// Body running, or body finished and children still running.
    Running,
    /// Finished with a value.
    Succeeded,
    /// Finished with an error.
    Failed(TaskError),
    /// Cancellation took effect.
    Cancelled,
}

impl TaskState {
    /// True for `Succeeded`, `Failed` and `Cancelled`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed(_) | TaskState::Cancelled
        )
    }

    /// Returns a short stable label for logs and snapshots.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed(_) => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }

    /// Maps a terminal outcome to its state.
    pub(crate) fn from_outcome<T>(outcome: &Result<T, TaskError>) -> Self {
        match outcome {
            Ok(_) => TaskState::Succeeded,
            Err(TaskError::Cancelled) => TaskState::Cancelled,
            Err(e) => TaskState::Failed(e.clone()),
        }
    }
}

/// Typed progress published by the runner to every handle clone.
#[derive(Debug)]
pub(crate) enum Progress<T> {
    Pending,
    Running,
    Done(Result<T, TaskError>),
}

impl<T> Progress<T> {
    #[inline]
    pub(crate) fn is_done(&self) -> bool {
        matches!(self, Progress::Done(_))
    }

    pub(crate) fn state(&self) -> TaskState {
        match self {
            Progress::Pending => TaskState::Pending,
            Progress::Running => TaskState::Running,
            Progress::Done(outcome) => TaskState::from_outcome(outcome),
        }
    }
}

impl<T: Clone> Progress<T> {
    pub(crate) fn outcome(&self) -> Option<Result<T, TaskError>> {
        match self {
            Progress::Done(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }
}
