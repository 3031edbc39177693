//! # Task handles.
//!
//! A [`TaskHandle`] is the caller's view of a spawned task: it can be joined
//! any number of times (from any number of places) and cancelled.
//!
//! ```text
//! runner ── watch::Sender<Progress<T>> ──► Pending ─► Running ─► Done(outcome)
//!                                              ▲
//! TaskHandle (clone 1..N) ── watch::Receiver ──┘   join() = wait_for(Done) + clone
//! ```
//!
//! The outcome lives in the watch channel, so it stays available until the
//! last handle clone is dropped, independently of the task's registry node.
//!
//! Handing a failure to a caller marks it as handled: a parent that joined a
//! failed child and carried on is not failed on that child's behalf.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{Progress, TaskId, TaskState};

/// Something that can be asked to stop.
///
/// Cancellation is cooperative, monotonic and idempotent.
pub trait Cancellable {
    /// Requests cancellation. Repeated calls have no further effect.
    fn cancel(&self);

    /// Whether cancellation has been requested.
    fn is_cancelled(&self) -> bool;
}

/// Something whose result can be awaited.
#[async_trait]
pub trait Awaitable {
    /// Success value.
    type Output;

    /// Waits for the terminal result.
    async fn join(&self) -> Result<Self::Output, TaskError>;
}

/// Handle to a spawned task producing `T`.
pub struct TaskHandle<T> {
    id: TaskId,
    name: Arc<str>,
    token: CancellationToken,
    rx: watch::Receiver<Progress<T>>,
    bus: Bus,
    observed: Arc<AtomicBool>,
}

/// Handle to a spawned [`TaskGroup`](crate::TaskGroup): results in insertion order.
pub type GroupHandle<T> = TaskHandle<Vec<T>>;

impl<T> TaskHandle<T> {
    pub(crate) fn new(
        id: TaskId,
        name: Arc<str>,
        token: CancellationToken,
        rx: watch::Receiver<Progress<T>>,
        bus: Bus,
        observed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            name,
            token,
            rx,
            bus,
            observed,
        }
    }

    /// Task identity.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.rx.borrow().state()
    }

    /// Whether the task reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.rx.borrow().is_done()
    }

    /// Requests cancellation of this task and its whole subtree.
    ///
    /// Idempotent: only the first effective request publishes `CancelRequested`.
    /// Cancelling a finished task has no effect.
    pub fn cancel(&self) {
        if self.token.is_cancelled() || self.is_finished() {
            return;
        }
        self.token.cancel();
        self.bus.publish(
            Event::new(EventKind::CancelRequested)
                .with_task(Arc::clone(&self.name))
                .with_task_id(self.id),
        );
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T: Clone> TaskHandle<T> {
    /// Returns the outcome if the task already finished.
    pub fn try_result(&self) -> Option<Result<T, TaskError>> {
        let outcome = self.rx.borrow().outcome();
        if outcome.is_some() {
            self.observed.store(true, Ordering::Release);
        }
        outcome
    }

    /// Waits for the task to finish and returns its outcome.
    ///
    /// Every joiner observes the same result. If the runner vanished without
    /// publishing one (runtime shut down), the task is reported as cancelled.
    pub async fn join(&self) -> Result<T, TaskError> {
        let mut rx = self.rx.clone();
        // Closed channel: fall through to whatever was last published.
        let _ = rx.wait_for(Progress::is_done).await.is_ok();
        self.try_result().unwrap_or(Err(TaskError::Cancelled))
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            token: self.token.clone(),
            rx: self.rx.clone(),
            bus: self.bus.clone(),
            observed: Arc::clone(&self.observed),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state().as_label())
            .finish()
    }
}

impl<T> Cancellable for TaskHandle<T> {
    fn cancel(&self) {
        TaskHandle::cancel(self);
    }

    fn is_cancelled(&self) -> bool {
        TaskHandle::is_cancelled(self)
    }
}

#[async_trait]
impl<T> Awaitable for TaskHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    async fn join(&self) -> Result<T, TaskError> {
        TaskHandle::join(self).await
    }
}
