use std::future::Future;
use std::time::Duration;

use tasktree::{Event, EventKind, Scheduler, SchedulerConfig, TaskId};
use tokio::sync::broadcast;

pub fn scheduler() -> Scheduler {
    Scheduler::builder(SchedulerConfig::default()).build()
}

pub fn scheduler_with(cfg: SchedulerConfig) -> Scheduler {
    Scheduler::builder(cfg).build()
}

/// Fails the test instead of hanging it.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test step timed out")
}

/// Receives events until one of `kind` (optionally for `task`) shows up.
pub async fn next_event(
    rx: &mut broadcast::Receiver<Event>,
    kind: EventKind,
    task: Option<TaskId>,
) -> Event {
    within(async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind && (task.is_none() || ev.task_id == task) => return ev,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        }
    })
    .await
}

/// Yields until `cond` holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    within(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
}
