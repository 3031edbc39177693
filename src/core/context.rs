//! # Per-task context handed to every task body.
//!
//! [`TaskContext`] is how a running body talks to the scheduler:
//! - observe cancellation (`is_cancelled`, `cancelled`, `checkpoint`);
//! - suspend cooperatively (`sleep`, `yield_now`), waking early on cancellation;
//! - spawn children, groups and timed children under itself.
//!
//! Cancellation is cooperative. A body that never reaches one of these
//! suspension points keeps running after cancellation has been requested;
//! checking the token at every await point is the body author's obligation.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use tasktree::{Scheduler, SchedulerConfig, TaskError};
//!
//! # async fn demo() -> Result<(), TaskError> {
//! let sched = Scheduler::builder(SchedulerConfig::default()).build();
//! let root = sched.spawn_root(|ctx| async move {
//!     let a = ctx.spawn(|c| async move {
//!         c.sleep(Duration::from_millis(10)).await?;
//!         Ok(20)
//!     })?;
//!     let b = ctx.spawn(|_| async move { Ok(22) })?;
//!     Ok(a.join().await? + b.join().await?)
//! });
//! assert_eq!(root.join().await?, 42);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::group::{self, TaskGroup};
use crate::core::handle::{GroupHandle, TaskHandle};
use crate::core::launch::Launcher;
use crate::core::scheduler::Scheduler;
use crate::error::TaskError;
use crate::events::Event;
use crate::tasks::{BoxWork, Priority, SpawnOptions, TaskId, boxed};

/// Handle a task body uses to observe cancellation and spawn children.
///
/// Cheap to clone. A clone moved elsewhere stays bound to the same task;
/// spawning through it after the task finished its body fails with
/// [`TaskError::InvalidParentState`].
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    name: Arc<str>,
    priority: Priority,
    token: CancellationToken,
    scheduler: Scheduler,
    launcher: Launcher,
}

impl TaskContext {
    pub(crate) fn new(
        id: TaskId,
        name: Arc<str>,
        priority: Priority,
        token: CancellationToken,
        scheduler: Scheduler,
        launcher: Launcher,
    ) -> Self {
        Self {
            id,
            name,
            priority,
            token,
            scheduler,
            launcher,
        }
    }

    /// Identity of the running task.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Name of the running task.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective priority of the running task.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Cancellation token of this task (child of the parent's token).
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether cancellation has been requested for this task.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Returns `Err(Cancelled)` if cancellation has been requested.
    ///
    /// Meant to be used with `?` between steps of a long computation.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.token.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `dur`, returning `Err(Cancelled)` early on cancellation.
    pub async fn sleep(&self, dur: Duration) -> Result<(), TaskError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TaskError::Cancelled),
            _ = tokio::time::sleep(dur) => Ok(()),
        }
    }

    /// Yields to the runtime, then checks for cancellation.
    pub async fn yield_now(&self) -> Result<(), TaskError> {
        tokio::task::yield_now().await;
        self.checkpoint()
    }

    /// Spawns a child task.
    ///
    /// The child starts once the current poll of this body returns, and
    /// this task will not finish before the child does.
    pub fn spawn<T, F, Fut>(&self, work: F) -> Result<TaskHandle<T>, TaskError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn_with(SpawnOptions::new(), work)
    }

    /// Spawns a child task with a name and/or priority override.
    pub fn spawn_with<T, F, Fut>(
        &self,
        opts: SpawnOptions,
        work: F,
    ) -> Result<TaskHandle<T>, TaskError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn_boxed(opts, boxed(work), false)
    }

    /// Spawns `group` as a child of this task.
    pub fn spawn_group<T>(&self, group: TaskGroup<T>) -> Result<GroupHandle<T>, TaskError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.spawn_boxed(
            SpawnOptions::named(group.default_name()),
            group.into_work(),
            true,
        )
    }

    /// Spawns a child that fails with [`TaskError::Timeout`] unless `work`
    /// finishes within `timeout`.
    pub fn spawn_with_timeout<T, F, Fut>(
        &self,
        timeout: Duration,
        work: F,
    ) -> Result<TaskHandle<T>, TaskError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn_boxed(
            SpawnOptions::new(),
            group::with_timeout(timeout, boxed(work)),
            true,
        )
    }

    /// Requests cancellation of every current child; returns how many there were.
    ///
    /// This task itself keeps running.
    pub fn cancel_children(&self) -> usize {
        self.scheduler.cancel_children_of(self.id)
    }

    /// Ids of the live children, in spawn order.
    pub fn children(&self) -> Vec<TaskId> {
        self.scheduler.children_of(self.id)
    }

    /// The scheduler this task runs under.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn spawn_boxed<T>(
        &self,
        opts: SpawnOptions,
        work: BoxWork<T>,
        absorbs_child_failures: bool,
    ) -> Result<TaskHandle<T>, TaskError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.scheduler.launch_child(
            self.id,
            opts,
            work,
            absorbs_child_failures,
            Some(&self.launcher),
        )
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.scheduler.publish(ev);
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
