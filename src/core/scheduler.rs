//! # Scheduler: owns task trees, event delivery and graceful shutdown.
//!
//! The [`Scheduler`] owns the event bus, the [`SubscriberSet`], the task
//! registry and the optional root admission gate. It is cheap to clone; every
//! clone drives the same set of task trees.
//!
//! ## High-level architecture
//! ```text
//! spawn_root(work) ─► TaskId + registry.register_root ─► tokio::spawn(run_task)
//!                                                            │
//!                       [root] AdmissionGate (priority + aging) when limited
//!                                                            ▼
//!                                               body(TaskContext)
//!                                                 ctx.spawn(..) ─► registry.register_child
//!                                                                  (launched after the poll)
//!
//! Event flow:
//!   runners / handles ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!                                                └──► Scheduler::subscribe() receivers
//!
//! Shutdown path:
//!   shutdown()
//!     └─► Bus.publish(ShutdownRequested)
//!     └─► runtime_token.cancel()      → propagates to every root and descendant
//!     └─► wait until no roots remain, at most cfg.grace:
//!            ├─ Ok        → Bus.publish(AllStoppedWithin)
//!            └─ timed out → Bus.publish(GraceExceeded) + RuntimeError::GraceExceeded{stuck}
//!     └─► listener_token.cancel()     → listener forwards the backlog, then SubscriberSet::shutdown
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use tasktree::{Priority, Scheduler, SchedulerConfig, SpawnOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = SchedulerConfig::default();
//!     cfg.max_concurrent_roots = 2;
//!     cfg.grace = Duration::from_secs(5);
//!
//!     let sched = Scheduler::builder(cfg).build();
//!     let report = sched.spawn_root_with(
//!         SpawnOptions::named("report").with_priority(Priority::High),
//!         |ctx| async move {
//!             ctx.sleep(Duration::from_millis(50)).await?;
//!             Ok("done")
//!         },
//!     );
//!
//!     println!("{}", report.join().await?);
//!     sched.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::builder::SchedulerBuilder;
use crate::core::config::SchedulerConfig;
use crate::core::context::TaskContext;
use crate::core::gate::AdmissionGate;
use crate::core::group::{self, TaskGroup};
use crate::core::handle::{GroupHandle, TaskHandle};
use crate::core::launch::Launcher;
use crate::core::registry::{Registry, TaskInfo};
use crate::core::runner::{TaskRun, run_task};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::tasks::{BoxWork, Progress, SpawnOptions, TaskId, boxed};

pub(crate) struct Inner {
    pub(crate) cfg: SchedulerConfig,
    pub(crate) bus: Bus,
    pub(crate) registry: Registry,
    pub(crate) gate: Option<Arc<AdmissionGate>>,
    pub(crate) runtime_token: CancellationToken,
    /// Stops the subscriber listener.
    pub(crate) listener_token: CancellationToken,
    pub(crate) listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.listener_token.cancel();
    }
}

/// Entry point for creating task trees.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a builder for constructing a scheduler.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    pub(crate) fn from_inner(inner: Inner, subs: SubscriberSet) -> Self {
        let sched = Self {
            inner: Arc::new(inner),
        };
        sched.subscriber_listener(subs);
        sched
    }

    /// Forwards bus events to the subscriber set until `listener_token` fires.
    ///
    /// The listener owns the set: once stopped it forwards what is already
    /// buffered, then closes the subscriber queues and waits for the workers.
    /// It holds no reference to the scheduler, so dropping the last
    /// [`Scheduler`] clone stops it too.
    fn subscriber_listener(&self, set: SubscriberSet) {
        if set.is_empty() {
            return;
        }
        let mut rx = self.inner.bus.subscribe();
        let stop = self.inner.listener_token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "subscriber listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });
        *self.inner.listener.lock() = Some(handle);
    }

    /// Stops event delivery to subscribers and waits, at most `grace`, for
    /// them to process what was already published.
    async fn stop_subscribers(&self) {
        self.inner.listener_token.cancel();
        let Some(listener) = self.inner.listener.lock().take() else {
            return;
        };
        if tokio::time::timeout(self.inner.cfg.grace, listener).await.is_err() {
            tracing::warn!("subscribers did not drain within grace");
        }
    }

    /// Spawns a new root task. Returns immediately.
    ///
    /// The root gets [`SchedulerConfig::default_priority`] and the name `task-<id>`.
    pub fn spawn_root<T, F, Fut>(&self, work: F) -> TaskHandle<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn_root_with(SpawnOptions::new(), work)
    }

    /// Spawns a new root task with a name and/or priority override.
    pub fn spawn_root_with<T, F, Fut>(&self, opts: SpawnOptions, work: F) -> TaskHandle<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.launch_root(opts, boxed(work), false)
    }

    /// Spawns a root that fails with [`TaskError::Timeout`] unless `work`
    /// finishes within `timeout`.
    ///
    /// The work and a timer run as sibling children of the returned task;
    /// whichever finishes first cancels the other.
    pub fn spawn_root_with_timeout<T, F, Fut>(&self, timeout: Duration, work: F) -> TaskHandle<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.launch_root(
            SpawnOptions::new(),
            group::with_timeout(timeout, boxed(work)),
            true,
        )
    }

    /// Spawns `group` as a new root.
    pub fn spawn_group<T>(&self, group: TaskGroup<T>) -> GroupHandle<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let opts = SpawnOptions::named(group.default_name());
        self.spawn_group_with(opts, group)
    }

    /// Spawns `group` as a new root with a name and/or priority override.
    pub fn spawn_group_with<T>(&self, opts: SpawnOptions, group: TaskGroup<T>) -> GroupHandle<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.launch_root(opts, group.into_work(), true)
    }

    /// Spawns a child under a running task identified by `parent`.
    ///
    /// Unlike [`TaskContext::spawn`](crate::TaskContext::spawn) the child is
    /// launched right away.
    ///
    /// # Errors
    /// [`TaskError::InvalidParentState`] if `parent` is unknown, finished,
    /// not started yet, joining its children, or cancelling under
    /// [`CancelledSpawn::Reject`](crate::CancelledSpawn::Reject).
    pub fn spawn_child<T, F, Fut>(&self, parent: TaskId, work: F) -> Result<TaskHandle<T>, TaskError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn_child_with(parent, SpawnOptions::new(), work)
    }

    /// [`Scheduler::spawn_child`] with a name and/or priority override.
    pub fn spawn_child_with<T, F, Fut>(
        &self,
        parent: TaskId,
        opts: SpawnOptions,
        work: F,
    ) -> Result<TaskHandle<T>, TaskError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.launch_child(parent, opts, boxed(work), false, None)
    }

    /// Requests cancellation of a live task and its subtree.
    ///
    /// Returns `false` if no such task is registered (unknown or finished).
    pub fn cancel(&self, id: TaskId) -> bool {
        let (known, first) = self.inner.registry.cancel(id);
        if first {
            let mut ev = Event::new(EventKind::CancelRequested).with_task_id(id);
            if let Some(name) = self.inner.registry.name(id) {
                ev = ev.with_task(name);
            }
            self.publish(ev);
        }
        known
    }

    /// Point-in-time view of every live task, sorted by id.
    pub fn snapshot(&self) -> Vec<TaskInfo> {
        self.inner.registry.snapshot()
    }

    /// Number of live (registered, non-terminal) tasks.
    pub fn live(&self) -> usize {
        self.inner.registry.len()
    }

    /// Active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.cfg
    }

    /// Receiver of every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Cancels every task tree and waits up to [`SchedulerConfig::grace`] for them to stop.
    ///
    /// Roots spawned afterwards are born cancelled. Subscribers receive every
    /// event up to the final `AllStoppedWithin` / `GraceExceeded` and are then
    /// released.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] with the names of the tasks still alive.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.publish(Event::new(EventKind::ShutdownRequested));
        self.inner.runtime_token.cancel();

        let grace = self.inner.cfg.grace;
        let mut roots = self.inner.registry.roots();
        let done = tokio::time::timeout(grace, async move {
            let _ = roots.wait_for(|n| *n == 0).await.is_ok();
        })
        .await;

        let res = match done {
            Ok(()) => {
                self.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck: Vec<String> = self.snapshot().into_iter().map(|t| t.name).collect();
                tracing::warn!(?grace, stuck = stuck.len(), "shutdown grace exceeded");
                self.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_reason(format!("stuck: {}", stuck.join(", "))),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };
        self.stop_subscribers().await;
        res
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.inner.bus.publish(ev);
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn gate(&self) -> Option<Arc<AdmissionGate>> {
        self.inner.gate.clone()
    }

    pub(crate) fn cancel_children_of(&self, id: TaskId) -> usize {
        self.inner.registry.cancel_children(id)
    }

    pub(crate) fn children_of(&self, id: TaskId) -> Vec<TaskId> {
        self.inner.registry.children(id)
    }

    fn task_name(opts: &SpawnOptions, id: TaskId) -> Arc<str> {
        match opts.name() {
            Some(name) => Arc::from(name),
            None => Arc::from(format!("task-{}", id.as_u64())),
        }
    }

    pub(crate) fn launch_root<T>(
        &self,
        opts: SpawnOptions,
        work: BoxWork<T>,
        absorbs_child_failures: bool,
    ) -> TaskHandle<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = TaskId::next();
        let name = Self::task_name(&opts, id);
        let priority = opts.priority().unwrap_or(self.inner.cfg.default_priority);
        let token = self.inner.runtime_token.child_token();

        self.inner
            .registry
            .register_root(id, Arc::clone(&name), priority, token.clone());
        self.publish(
            Event::new(EventKind::TaskSpawned)
                .with_task(Arc::clone(&name))
                .with_task_id(id)
                .with_priority(priority),
        );

        let (tx, rx) = watch::channel(Progress::Pending);
        let handle = TaskHandle::new(
            id,
            Arc::clone(&name),
            token.clone(),
            rx,
            self.inner.bus.clone(),
            Arc::default(),
        );
        let run = TaskRun {
            id,
            name,
            parent: None,
            priority,
            token,
            work,
            absorbs_child_failures,
            progress: tx,
        };
        tokio::spawn(run_task(self.clone(), run));
        handle
    }

    pub(crate) fn launch_child<T>(
        &self,
        parent: TaskId,
        opts: SpawnOptions,
        work: BoxWork<T>,
        absorbs_child_failures: bool,
        launcher: Option<&Launcher>,
    ) -> Result<TaskHandle<T>, TaskError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = TaskId::next();
        let name = Self::task_name(&opts, id);
        let observed = Arc::new(AtomicBool::new(false));

        let placement = match self.inner.registry.register_child(
            parent,
            id,
            Arc::clone(&name),
            opts.priority(),
            self.inner.cfg.cancelled_spawn,
            Arc::clone(&observed),
        ) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(task = %name, parent = %parent, error = %e, "spawn rejected");
                self.publish(
                    Event::new(EventKind::SpawnRejected)
                        .with_task(name)
                        .with_parent(Some(parent))
                        .with_reason(e.as_message()),
                );
                return Err(e);
            }
        };
        self.publish(
            Event::new(EventKind::TaskSpawned)
                .with_task(Arc::clone(&name))
                .with_task_id(id)
                .with_parent(Some(parent))
                .with_priority(placement.priority),
        );

        let (tx, rx) = watch::channel(Progress::Pending);
        let handle = TaskHandle::new(
            id,
            Arc::clone(&name),
            placement.token.clone(),
            rx,
            self.inner.bus.clone(),
            observed,
        );
        let run = TaskRun {
            id,
            name,
            parent: Some(parent),
            priority: placement.priority,
            token: placement.token,
            work,
            absorbs_child_failures,
            progress: tx,
        };

        let fut = run_task(self.clone(), run);
        match launcher {
            Some(l) => l.submit(move || {
                tokio::spawn(fut);
            }),
            None => {
                tokio::spawn(fut);
            }
        }
        Ok(handle)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("live", &self.live())
            .field(
                "delivering_events",
                &(self.inner.listener.lock().is_some() && !self.inner.listener_token.is_cancelled()),
            )
            .field("shutting_down", &self.inner.runtime_token.is_cancelled())
            .finish()
    }
}
