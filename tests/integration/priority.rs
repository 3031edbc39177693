use tasktree::{Holder, Priority, SchedulerConfig, SpawnOptions, TaskError, TaskHandle, TaskState};
use tokio::sync::oneshot;

use crate::common::{eventually, scheduler_with, within};

fn limited(max_concurrent_roots: usize, aging_step: usize) -> tasktree::Scheduler {
    let mut cfg = SchedulerConfig::default();
    cfg.max_concurrent_roots = max_concurrent_roots;
    cfg.aging_step = aging_step;
    scheduler_with(cfg)
}

fn record(
    sched: &tasktree::Scheduler,
    order: &Holder<Vec<&'static str>>,
    name: &'static str,
    priority: Priority,
) -> TaskHandle<()> {
    let order = order.clone();
    sched.spawn_root_with(
        SpawnOptions::named(name).with_priority(priority),
        move |_| async move {
            order.mutate(move |v| v.push(name)).await?;
            Ok(())
        },
    )
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn waiting_roots_are_admitted_by_priority() {
    let sched = limited(1, 100);
    let order = Holder::named("order", Vec::new());
    let (release, blocked) = oneshot::channel::<()>();

    let blocker = sched.spawn_root(move |_| async move {
        let _ = blocked.await;
        Ok(())
    });
    eventually(|| blocker.state() == TaskState::Running).await;

    let low = record(&sched, &order, "low", Priority::Low);
    settle().await;
    let high = record(&sched, &order, "high", Priority::High);
    let critical = record(&sched, &order, "critical", Priority::Critical);
    settle().await;
    assert_eq!(low.state(), TaskState::Pending);

    let _ = release.send(());
    for h in [&low, &high, &critical] {
        within(h.join()).await.expect("root");
    }
    assert_eq!(order.snapshot().await, Ok(vec!["critical", "high", "low"]));
}

#[tokio::test]
async fn aging_lets_a_starved_root_through() {
    let sched = limited(1, 1);
    let order = Holder::named("order", Vec::new());
    let (release, blocked) = oneshot::channel::<()>();

    let blocker = sched.spawn_root(move |_| async move {
        let _ = blocked.await;
        Ok(())
    });
    eventually(|| blocker.state() == TaskState::Running).await;

    let background = record(&sched, &order, "background", Priority::Background);
    settle().await;
    let mut others = Vec::new();
    for name in ["h1", "h2", "h3", "h4"] {
        others.push(record(&sched, &order, name, Priority::High));
    }
    settle().await;

    let _ = release.send(());
    within(background.join()).await.expect("background");
    for h in &others {
        within(h.join()).await.expect("high");
    }

    // Overtaken once per admission: Background → Low → Medium → High, then
    // it is the oldest High waiter.
    let order = order.snapshot().await.expect("order");
    assert_eq!(order, vec!["h1", "h2", "h3", "background", "h4"]);
}

#[tokio::test]
async fn cancelled_waiter_never_runs() {
    let sched = limited(1, 4);
    let (release, blocked) = oneshot::channel::<()>();

    let blocker = sched.spawn_root(move |_| async move {
        let _ = blocked.await;
        Ok(())
    });
    eventually(|| blocker.state() == TaskState::Running).await;

    let waiting = sched.spawn_root(|_| async { Err::<(), _>(TaskError::fail("must not run")) });
    settle().await;
    waiting.cancel();
    assert_eq!(within(waiting.join()).await, Err(TaskError::Cancelled));

    let _ = release.send(());
    within(blocker.join()).await.expect("blocker");
    let after = sched.spawn_root(|_| async { Ok(1) });
    assert_eq!(within(after.join()).await, Ok(1));
}
