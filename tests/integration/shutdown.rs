use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tasktree::{
    Event, EventKind, RuntimeError, Scheduler, SchedulerConfig, SpawnOptions, Subscribe, TaskError,
};

use crate::common::{eventually, next_event, scheduler_with, within};

fn with_grace(grace: Duration) -> tasktree::Scheduler {
    let mut cfg = SchedulerConfig::default();
    cfg.grace = grace;
    scheduler_with(cfg)
}

#[tokio::test]
async fn cooperative_trees_stop_within_grace() {
    let sched = with_grace(Duration::from_secs(2));
    let mut events = sched.subscribe();

    let mut roots = Vec::new();
    for _ in 0..3 {
        roots.push(sched.spawn_root(|ctx| async move {
            ctx.spawn(|c| async move {
                c.cancelled().await;
                Err::<(), _>(TaskError::Cancelled)
            })?;
            ctx.cancelled().await;
            Err::<(), _>(TaskError::Cancelled)
        }));
    }
    eventually(|| sched.live() == 6).await;

    within(sched.shutdown()).await.expect("clean shutdown");
    next_event(&mut events, EventKind::ShutdownRequested, None).await;
    next_event(&mut events, EventKind::AllStoppedWithin, None).await;
    for root in roots {
        assert_eq!(root.join().await, Err(TaskError::Cancelled));
    }
    assert_eq!(sched.live(), 0);
}

#[tokio::test]
async fn stubborn_task_exceeds_grace() {
    let sched = with_grace(Duration::from_millis(100));
    let mut events = sched.subscribe();

    let _stubborn = sched.spawn_root_with(SpawnOptions::named("stubborn"), |_| async {
        // Never checks its token.
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(())
    });
    eventually(|| sched.live() == 1).await;

    match within(sched.shutdown()).await {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(100));
            assert_eq!(stuck, vec!["stubborn".to_string()]);
        }
        other => panic!("unexpected shutdown result: {other:?}"),
    }
    let ev = next_event(&mut events, EventKind::GraceExceeded, None).await;
    assert_eq!(ev.reason.as_deref(), Some("stuck: stubborn"));
}

#[tokio::test]
async fn roots_spawned_after_shutdown_are_born_cancelled() {
    let sched = with_grace(Duration::from_secs(1));
    within(sched.shutdown()).await.expect("empty shutdown");

    let ran = Arc::new(AtomicBool::new(false));
    let late = sched.spawn_root({
        let ran = ran.clone();
        move |_| async move {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        }
    });
    assert_eq!(within(late.join()).await, Err(TaskError::Cancelled));
    assert!(!ran.load(Ordering::SeqCst));
}

/// Remembers whether the final shutdown event reached it.
#[derive(Default)]
struct Witness {
    saw_stop: AtomicBool,
}

#[async_trait::async_trait]
impl Subscribe for Witness {
    async fn on_event(&self, ev: &Event) {
        if ev.kind == EventKind::AllStoppedWithin {
            self.saw_stop.store(true, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &'static str {
        "witness"
    }
}

#[tokio::test]
async fn shutdown_flushes_and_releases_subscribers() {
    let witness = Arc::new(Witness::default());
    let sched = Scheduler::builder(SchedulerConfig::default())
        .with_subscriber(witness.clone())
        .build();

    let root = sched.spawn_root(|_| async { Ok(()) });
    within(root.join()).await.expect("root");
    within(sched.shutdown()).await.expect("shutdown");

    assert!(witness.saw_stop.load(Ordering::SeqCst));
    drop(sched);
    eventually(|| Arc::strong_count(&witness) == 1).await;
}

#[tokio::test]
async fn dropping_the_scheduler_releases_subscribers() {
    let witness = Arc::new(Witness::default());
    let sched = Scheduler::builder(SchedulerConfig::default())
        .with_subscriber(witness.clone())
        .build();

    let root = sched.spawn_root(|_| async { Ok(1) });
    assert_eq!(within(root.join()).await, Ok(1));
    drop(sched);
    eventually(|| Arc::strong_count(&witness) == 1).await;
}
