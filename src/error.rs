//! Error types used by the scheduler, task bodies and state holders.
//!
//! This module defines three error enums:
//!
//! - [`TaskError`]: the terminal error of a task (own failure, cancellation,
//!   child failure, group failure, holder failure, panic).
//! - [`HolderError`]: errors returned by a [`Holder`](crate::Holder) operation
//!   to the caller that issued it.
//! - [`RuntimeError`]: errors raised by the scheduler itself (shutdown).
//!
//! All types provide `as_label` for logs/metrics. [`TaskError`] and
//! [`HolderError`] are `Clone` so that every awaiter of a task observes the
//! same terminal result.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::tasks::TaskId;

/// # Errors produced by the scheduler runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some tasks were still alive.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks that were still registered when the grace expired.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tasktree::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// Why a parent refused a new child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRejection {
    /// Parent is registered but its body has not started yet.
    NotStarted,
    /// Parent finished (or never existed): no node in the registry.
    Finished,
    /// Parent body returned and the task is waiting for its children.
    Joining,
    /// Parent was cancelled and the scheduler is configured to reject spawns.
    Cancelling,
}

impl fmt::Display for ParentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParentRejection::NotStarted => "parent has not started",
            ParentRejection::Finished => "parent is not running",
            ParentRejection::Joining => "parent is joining its children",
            ParentRejection::Cancelling => "parent is cancelling",
        };
        f.write_str(s)
    }
}

/// One failed member of a [`GroupPolicy::CollectAll`](crate::GroupPolicy::CollectAll) group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFailure {
    /// Insertion index of the member inside its group.
    pub index: usize,
    /// Identity of the member task.
    pub task: TaskId,
    /// Terminal error of the member.
    pub error: TaskError,
}

/// # Terminal errors of a task.
///
/// A task body returns `Result<T, TaskError>`; the scheduler adds the
/// structural variants (`ChildFailure`, `Group`, `InvalidParentState`,
/// `Panicked`). [`TaskError::Cancelled`] is an expected outcome rather than a
/// failure: it maps to the `cancelled` task state.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task body failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Cooperative cancellation took effect.
    #[error("task cancelled")]
    Cancelled,

    /// The task lost the race against its timer.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// A child could not be attached to `parent`.
    #[error("cannot spawn under task {parent}: {reason}")]
    InvalidParentState {
        /// The parent that refused the child.
        parent: TaskId,
        /// Why it refused.
        reason: ParentRejection,
    },

    /// The first failing child of a task whose own body succeeded.
    #[error("child task {child} failed: {source}")]
    ChildFailure {
        /// The failing child.
        child: TaskId,
        /// The child's terminal error.
        source: Box<TaskError>,
    },

    /// Aggregate failure of a collect-all group, in member order.
    #[error("{} group member(s) failed", failures.len())]
    Group {
        /// Every failed member exactly once.
        failures: Vec<MemberFailure>,
    },

    /// A holder operation issued by the task failed.
    #[error(transparent)]
    Holder(#[from] HolderError),

    /// The task body panicked.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from anything printable.
    ///
    /// ```
    /// use tasktree::TaskError;
    ///
    /// let err = TaskError::fail("boom");
    /// assert_eq!(err, TaskError::Fail { error: "boom".into() });
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tasktree::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Cancelled => "task_cancelled",
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::InvalidParentState { .. } => "task_invalid_parent",
            TaskError::ChildFailure { .. } => "task_child_failed",
            TaskError::Group { .. } => "task_group_failed",
            TaskError::Holder(_) => "task_holder_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Cancelled => "cancelled".to_string(),
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::InvalidParentState { parent, reason } => {
                format!("invalid parent {parent}: {reason}")
            }
            TaskError::ChildFailure { child, source } => {
                format!("child {child}: {}", source.as_message())
            }
            TaskError::Group { failures } => {
                let members: Vec<String> = failures
                    .iter()
                    .map(|f| format!("#{}={}", f.index, f.error.as_label()))
                    .collect();
                format!("group failures: [{}]", members.join(", "))
            }
            TaskError::Holder(e) => format!("holder: {e}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
        }
    }

    /// True for [`TaskError::Cancelled`].
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

/// # Errors returned by holder operations.
///
/// Delivered only to the caller whose operation produced them; the holder
/// stays usable afterwards.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HolderError {
    /// The operation closure returned an error.
    #[error("holder operation failed: {error}")]
    Operation {
        /// The underlying error message.
        error: String,
    },

    /// The operation closure panicked.
    #[error("holder operation panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The holder worker is gone (runtime shut down).
    #[error("holder is closed")]
    Closed,
}

impl HolderError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HolderError::Operation { .. } => "holder_operation_failed",
            HolderError::Panicked { .. } => "holder_operation_panicked",
            HolderError::Closed => "holder_closed",
        }
    }
}

/// Renders a panic payload the way `std` prints it.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
