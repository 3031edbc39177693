//! # Run one task from admission to its terminal state.
//!
//! ## Flow
//!
//! ```text
//! [root only] admission gate ── select ── token.cancelled()
//!       │
//!       ├─ cancelled before start ──────────────────────────► Cancelled (body never runs)
//!       ▼
//! mark_running → publish TaskStarting
//! body(ctx)  (deferred child launch, panic caught)
//!       │     body Err → cancel children
//!       ▼
//! seal: no new children, wait until live children == 0
//!       ▼
//! resolve outcome → registry.remove → publish terminal event → watch: Done(outcome)
//!                 → registry.release (parent's live count, child failure)
//! ```
//!
//! ## Outcome rules
//! - body `Err(e)` → `Err(e)` (`Cancelled` maps to the cancelled state)
//! - body `Ok`, an unjoined child failed, token cancelled → `Cancelled`
//! - body `Ok`, an unjoined child failed → `ChildFailure { first such child }`
//! - body `Ok`, otherwise → `Ok(value)`
//!
//! A child failure some joiner already received counts as handled. Group
//! tasks absorb every member failure: their body already aggregated them.
//!
//! ## Rules
//! - Publishes **exactly one** terminal event: `TaskSucceeded`, `TaskFailed` or `TaskCancelled`.
//! - A failed root is also reported through `tracing::warn!`, so failures of
//!   roots nobody joins are never silent.
//! - The registry node is removed **before** the outcome is published, so a
//!   joiner never observes a finished task that is still registered.
//! - The parent is released **after** the outcome is published, so a parent
//!   never resolves while a child handle still reads as running.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::context::TaskContext;
use crate::core::launch::Launcher;
use crate::core::scheduler::Scheduler;
use crate::error::{TaskError, panic_message};
use crate::events::{Event, EventKind};
use crate::tasks::{BoxWork, Priority, Progress, TaskId, TaskState};

/// Everything the runner needs to drive one task.
pub(crate) struct TaskRun<T> {
    pub(crate) id: TaskId,
    pub(crate) name: Arc<str>,
    pub(crate) parent: Option<TaskId>,
    pub(crate) priority: Priority,
    pub(crate) token: CancellationToken,
    pub(crate) work: BoxWork<T>,
    pub(crate) absorbs_child_failures: bool,
    pub(crate) progress: watch::Sender<Progress<T>>,
}

/// Drives `run` to completion.
pub(crate) async fn run_task<T>(sched: Scheduler, run: TaskRun<T>)
where
    T: Send + Sync + 'static,
{
    let TaskRun {
        id,
        name,
        parent,
        priority,
        token,
        work,
        absorbs_child_failures,
        progress,
    } = run;

    let _permit = match (parent, sched.gate()) {
        (None, Some(gate)) => tokio::select! {
            biased;
            _ = token.cancelled() => None,
            permit = gate.acquire(priority) => permit,
        },
        _ => None,
    };

    if token.is_cancelled() {
        finish(&sched, id, &name, parent, Err(TaskError::Cancelled), &progress);
        return;
    }

    sched.registry().mark_running(id);
    progress.send_replace(Progress::Running);
    sched.publish(
        Event::new(EventKind::TaskStarting)
            .with_task(Arc::clone(&name))
            .with_task_id(id)
            .with_parent(parent)
            .with_priority(priority),
    );

    let launcher = Launcher::new();
    let ctx = TaskContext::new(
        id,
        Arc::clone(&name),
        priority,
        token.clone(),
        sched.clone(),
        launcher.clone(),
    );
    let body = match launcher.wrap(async move { work(ctx).await }).await {
        Ok(res) => res,
        Err(payload) => Err(TaskError::Panicked {
            info: panic_message(&*payload),
        }),
    };

    if body.is_err() {
        sched.registry().cancel_children(id);
    }
    if let Some(mut live) = sched.registry().seal(id) {
        let _ = live.wait_for(|n| *n == 0).await.is_ok();
    }

    let child_failure = sched.registry().take_first_failure(id);
    let outcome = match (body, child_failure) {
        (Err(e), _) => Err(e),
        (Ok(v), None) => Ok(v),
        (Ok(v), Some(_)) if absorbs_child_failures => Ok(v),
        (Ok(_), Some(_)) if token.is_cancelled() => Err(TaskError::Cancelled),
        (Ok(_), Some((child, source))) => Err(TaskError::ChildFailure {
            child,
            source: Box::new(source),
        }),
    };
    finish(&sched, id, &name, parent, outcome, &progress);
}

/// Unregisters the task, reports the outcome and hands it to the joiners.
fn finish<T>(
    sched: &Scheduler,
    id: TaskId,
    name: &Arc<str>,
    parent: Option<TaskId>,
    outcome: Result<T, TaskError>,
    progress: &watch::Sender<Progress<T>>,
) {
    let detached = sched.registry().remove(id);
    let state = TaskState::from_outcome(&outcome);

    let ev = match &outcome {
        Ok(_) => Event::new(EventKind::TaskSucceeded),
        Err(TaskError::Cancelled) => {
            tracing::debug!(task = %name, id = %id, "task cancelled");
            Event::new(EventKind::TaskCancelled)
        }
        Err(e) => {
            if parent.is_none() {
                tracing::warn!(task = %name, id = %id, error = %e, "root task failed");
            }
            Event::new(EventKind::TaskFailed).with_reason(e.as_message())
        }
    };
    sched.publish(
        ev.with_task(Arc::clone(name))
            .with_task_id(id)
            .with_parent(parent),
    );

    progress.send_replace(Progress::Done(outcome));
    if let Some(detached) = detached {
        sched.registry().release(detached, &state);
    }
}
