use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tasktree::{
    Awaitable, Cancellable, CancelledSpawn, Event, EventKind, Holder, ParentRejection, Priority,
    Scheduler, SchedulerConfig, SpawnOptions, Subscribe, TaskError, TaskState,
};

use crate::common::{eventually, next_event, scheduler, scheduler_with, within};

#[tokio::test]
async fn children_spawned_after_cancel_never_run() {
    let sched = scheduler();
    let ran = Arc::new(AtomicUsize::new(0));

    let root = sched.spawn_root({
        let ran = ran.clone();
        move |ctx| async move {
            ctx.scheduler().cancel(ctx.id());
            let mut children = Vec::new();
            for _ in 0..3 {
                let ran = ran.clone();
                children.push(ctx.spawn(move |_| async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })?);
            }
            let mut outcomes = Vec::new();
            for child in &children {
                outcomes.push(child.join().await);
                assert_eq!(child.state(), TaskState::Cancelled);
            }
            Ok(outcomes)
        }
    });

    let outcomes = within(root.join()).await.expect("root");
    assert_eq!(outcomes, vec![Err(TaskError::Cancelled); 3]);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reject_policy_refuses_children_of_cancelling_parent() {
    let mut cfg = SchedulerConfig::default();
    cfg.cancelled_spawn = CancelledSpawn::Reject;
    let sched = scheduler_with(cfg);

    let root = sched.spawn_root(|ctx| async move {
        ctx.scheduler().cancel(ctx.id());
        Ok(ctx.spawn(|_| async { Ok(()) }).err())
    });

    let rejected = within(root.join()).await.expect("root");
    assert!(matches!(
        rejected,
        Some(TaskError::InvalidParentState {
            reason: ParentRejection::Cancelling,
            ..
        })
    ));
}

#[tokio::test]
async fn root_failure_reaches_joiner_and_bus() {
    let sched = scheduler();
    let mut events = sched.subscribe();

    let root = sched.spawn_root_with(SpawnOptions::named("boom"), |_| async {
        Err::<(), _>(TaskError::fail("boom"))
    });

    assert_eq!(
        within(root.join()).await,
        Err(TaskError::Fail {
            error: "boom".into()
        })
    );
    let ev = next_event(&mut events, EventKind::TaskFailed, Some(root.id())).await;
    assert_eq!(ev.task.as_deref(), Some("boom"));
    assert_eq!(ev.reason.as_deref(), Some("error: boom"));
}

#[tokio::test]
async fn parent_resolves_after_all_sleeping_children() {
    let sched = scheduler();
    let finished = Holder::named("finished", Vec::new());

    let root = sched.spawn_root({
        let finished = finished.clone();
        move |ctx| async move {
            for i in 0..3usize {
                let finished = finished.clone();
                ctx.spawn(move |c| async move {
                    c.sleep(Duration::from_millis(20 * (3 - i as u64))).await?;
                    finished.mutate(move |v| v.push(i)).await?;
                    Ok(i)
                })?;
            }
            Ok("parent")
        }
    });

    assert_eq!(within(root.join()).await, Ok("parent"));
    let mut done = finished.snapshot().await.expect("snapshot");
    assert_eq!(done, vec![2, 1, 0]);
    done.sort_unstable();
    assert_eq!(done, vec![0, 1, 2]);
    assert_eq!(sched.live(), 0);
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let sched = scheduler();
    let mut events = sched.subscribe();

    let root = sched.spawn_root(|ctx| async move {
        ctx.cancelled().await;
        Err::<(), _>(TaskError::Cancelled)
    });
    eventually(|| sched.snapshot().iter().any(|t| t.state == TaskState::Running)).await;

    root.cancel();
    root.cancel();
    assert!(sched.cancel(root.id()));

    assert_eq!(within(root.join()).await, Err(TaskError::Cancelled));
    assert_eq!(root.state(), TaskState::Cancelled);
    next_event(&mut events, EventKind::TaskCancelled, Some(root.id())).await;
    assert!(!sched.cancel(root.id()));
}

#[tokio::test]
async fn cancel_requested_is_published_once() {
    let sched = scheduler();
    let mut events = sched.subscribe();

    let root = sched.spawn_root(|ctx| async move {
        ctx.cancelled().await;
        Err::<(), _>(TaskError::Cancelled)
    });
    root.cancel();
    Cancellable::cancel(&root);
    sched.cancel(root.id());
    within(root.join()).await.expect_err("cancelled");

    let mut requested = 0;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::CancelRequested {
            requested += 1;
        }
    }
    assert_eq!(requested, 1);
}

#[tokio::test]
async fn child_failure_surfaces_through_successful_parent() {
    let sched = scheduler();
    let root = sched.spawn_root(|ctx| async move {
        let child = ctx.spawn(|_| async { Err::<(), _>(TaskError::fail("child")) })?;
        Ok(child.id())
    });

    match within(root.join()).await {
        Err(TaskError::ChildFailure { source, .. }) => {
            assert_eq!(*source, TaskError::fail("child"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn parent_that_handles_a_joined_failure_succeeds() {
    let sched = scheduler();
    let root = sched.spawn_root(|ctx| async move {
        let primary = ctx.spawn(|_| async { Err::<u32, _>(TaskError::fail("primary down")) })?;
        let value = match primary.join().await {
            Ok(v) => v,
            Err(_) => 7,
        };
        Ok(value)
    });
    assert_eq!(within(root.join()).await, Ok(7));
}

#[tokio::test]
async fn only_unjoined_failures_reach_the_parent() {
    let sched = scheduler();
    let (id_tx, id_rx) = tokio::sync::oneshot::channel();
    let root = sched.spawn_root(|ctx| async move {
        let handled = ctx.spawn(|_| async { Err::<(), _>(TaskError::fail("handled")) })?;
        let ignored = ctx.spawn(|c| async move {
            c.sleep(Duration::from_millis(10)).await?;
            Err::<(), _>(TaskError::fail("ignored"))
        })?;
        let _ = id_tx.send(ignored.id());
        let _ = handled.join().await;
        Ok(())
    });

    let ignored = within(id_rx).await.expect("child id");
    match within(root.join()).await {
        Err(TaskError::ChildFailure { child, source }) => {
            assert_eq!(child, ignored);
            assert_eq!(*source, TaskError::fail("ignored"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn children_outcomes_are_published_before_the_parent_resolves() {
    let sched = scheduler();
    for _ in 0..50 {
        let root = sched.spawn_root(|ctx| async move {
            let mut kids = Vec::new();
            for i in 0..4u64 {
                kids.push(ctx.spawn(move |_| async move { Ok(i) })?);
            }
            Ok(kids)
        });
        let kids = within(root.join()).await.expect("root");
        for kid in &kids {
            assert!(kid.is_finished(), "{} still reads {:?}", kid.name(), kid.state());
        }
    }
}

#[tokio::test]
async fn child_failure_under_cancelled_parent_reads_as_cancelled() {
    let sched = scheduler();
    let root = sched.spawn_root(|ctx| async move {
        ctx.spawn(|c| async move {
            c.cancelled().await;
            Err::<(), _>(TaskError::fail("late"))
        })?;
        ctx.scheduler().cancel(ctx.id());
        Ok(())
    });
    assert_eq!(within(root.join()).await, Err(TaskError::Cancelled));
}

#[tokio::test]
async fn failing_body_cancels_its_children() {
    let sched = scheduler();
    let child_saw_cancel = Arc::new(AtomicBool::new(false));

    let root = sched.spawn_root({
        let flag = child_saw_cancel.clone();
        move |ctx| async move {
            ctx.spawn(move |c| async move {
                c.cancelled().await;
                flag.store(true, Ordering::SeqCst);
                Err::<(), _>(TaskError::Cancelled)
            })?;
            ctx.sleep(Duration::from_millis(10)).await?;
            Err::<(), _>(TaskError::fail("parent"))
        }
    });

    assert_eq!(within(root.join()).await, Err(TaskError::fail("parent")));
    assert!(child_saw_cancel.load(Ordering::SeqCst));
    assert_eq!(sched.live(), 0);
}

#[tokio::test]
async fn panics_become_task_errors() {
    let sched = scheduler();
    let root = sched.spawn_root(|ctx| async move {
        ctx.checkpoint()?;
        if ctx.name().starts_with("task-") {
            panic!("kaboom");
        }
        Ok(())
    });
    assert_eq!(
        within(root.join()).await,
        Err(TaskError::Panicked {
            info: "kaboom".into()
        })
    );
}

#[tokio::test]
async fn spawning_under_finished_parent_is_rejected() {
    let sched = scheduler();
    let mut events = sched.subscribe();

    let root = sched.spawn_root(|ctx| async move { Ok(ctx) });
    let ctx = within(root.join()).await.expect("context");

    let via_ctx = ctx.spawn(|_| async { Ok(()) });
    assert!(matches!(
        via_ctx,
        Err(TaskError::InvalidParentState {
            reason: ParentRejection::Finished,
            ..
        })
    ));

    let via_sched = sched.spawn_child(root.id(), |_| async { Ok(()) });
    assert!(via_sched.is_err());
    let ev = next_event(&mut events, EventKind::SpawnRejected, None).await;
    assert_eq!(ev.parent, Some(root.id()));
}

#[tokio::test]
async fn external_spawn_child_joins_the_tree() {
    let sched = scheduler();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    let root = sched.spawn_root_with(
        SpawnOptions::named("host").with_priority(Priority::High),
        |_| async move {
            let _ = release_rx.await;
            Ok(())
        },
    );
    eventually(|| sched.snapshot().iter().any(|t| t.state == TaskState::Running)).await;

    let child = sched
        .spawn_child_with(root.id(), SpawnOptions::named("guest"), |ctx| async move {
            Ok(ctx.priority())
        })
        .expect("spawn under running root");
    assert_eq!(within(child.join()).await, Ok(Priority::High));

    let _ = release_tx.send(());
    within(root.join()).await.expect("root");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn children_start_only_after_the_parent_suspends() {
    let sched = scheduler();
    let started = Arc::new(AtomicBool::new(false));

    let root = sched.spawn_root({
        let started = started.clone();
        move |ctx| async move {
            let flag = started.clone();
            let child = ctx.spawn(move |_| async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })?;
            // Synchronous section: no suspension point until the check.
            std::thread::sleep(Duration::from_millis(50));
            let early = started.load(Ordering::SeqCst);
            child.join().await?;
            Ok(early)
        }
    });

    assert_eq!(within(root.join()).await, Ok(false));
    assert!(started.load(Ordering::SeqCst));
}

#[tokio::test]
async fn every_joiner_observes_the_same_result() {
    let sched = scheduler();
    let root = sched.spawn_root(|ctx| async move {
        ctx.sleep(Duration::from_millis(10)).await?;
        Ok(String::from("shared"))
    });

    let joins: Vec<_> = (0..5)
        .map(|_| {
            let h = root.clone();
            tokio::spawn(async move { h.join().await })
        })
        .collect();
    for j in joins {
        assert_eq!(j.await.expect("join task"), Ok("shared".to_string()));
    }
    assert_eq!(root.try_result(), Some(Ok("shared".to_string())));
}

async fn stop<H>(h: &H) -> Result<H::Output, TaskError>
where
    H: Cancellable + Awaitable,
{
    h.cancel();
    h.join().await
}

#[tokio::test]
async fn handles_work_through_the_capability_traits() {
    let sched = scheduler();
    let root = sched.spawn_root(|ctx| async move {
        while !ctx.is_cancelled() {
            ctx.sleep(Duration::from_millis(5)).await?;
        }
        Err::<u8, _>(TaskError::Cancelled)
    });
    assert_eq!(within(stop(&root)).await, Err(TaskError::Cancelled));
    assert!(Cancellable::is_cancelled(&root));
}

#[tokio::test]
async fn snapshot_reports_tree_shape_and_inherited_priority() {
    let sched = scheduler();
    let root = sched.spawn_root_with(
        SpawnOptions::named("parent").with_priority(Priority::High),
        |ctx| async move {
            ctx.spawn_with(SpawnOptions::named("kid"), |c| async move {
                c.cancelled().await;
                Err::<(), _>(TaskError::Cancelled)
            })?;
            assert_eq!(ctx.children().len(), 1);
            ctx.cancelled().await;
            Err::<(), _>(TaskError::Cancelled)
        },
    );

    eventually(|| sched.live() == 2).await;
    let snap = sched.snapshot();
    let parent = snap.iter().find(|t| t.name == "parent").expect("parent");
    let kid = snap.iter().find(|t| t.name == "kid").expect("kid");
    assert_eq!(kid.parent, Some(parent.id));
    assert_eq!(parent.children, vec![kid.id]);
    assert_eq!(kid.priority, Priority::High);
    assert!(!parent.cancelled);

    root.cancel();
    assert_eq!(within(root.join()).await, Err(TaskError::Cancelled));
    assert_eq!(sched.live(), 0);
}

struct Succeeded(Holder<Vec<String>>);

#[async_trait::async_trait]
impl Subscribe for Succeeded {
    async fn on_event(&self, ev: &Event) {
        if ev.kind == EventKind::TaskSucceeded {
            let name = ev.task.as_deref().unwrap_or_default().to_string();
            let _ = self.0.mutate(move |v| v.push(name)).await;
        }
    }

    fn name(&self) -> &'static str {
        "succeeded"
    }
}

struct Faulty;

#[async_trait::async_trait]
impl Subscribe for Faulty {
    async fn on_event(&self, ev: &Event) {
        if ev.kind == EventKind::TaskStarting {
            panic!("faulty subscriber");
        }
    }

    fn name(&self) -> &'static str {
        "faulty"
    }
}

#[tokio::test]
async fn subscribers_observe_lifecycle_and_are_isolated() {
    let seen = Holder::named("seen", Vec::new());
    let sched = Scheduler::builder(SchedulerConfig::default())
        .with_subscriber(Arc::new(Succeeded(seen.clone())))
        .with_subscriber(Arc::new(Faulty))
        .build();
    let mut events = sched.subscribe();

    let root = sched.spawn_root_with(SpawnOptions::named("observed"), |ctx| async move {
        ctx.spawn_with(SpawnOptions::named("observed-child"), |_| async { Ok(()) })?;
        Ok(())
    });
    within(root.join()).await.expect("root");

    let ev = next_event(&mut events, EventKind::SubscriberPanicked, None).await;
    assert_eq!(ev.task.as_deref(), Some("faulty"));
    eventually(|| seen.completed() >= 2).await;
    let mut names = seen.snapshot().await.expect("names");
    names.sort();
    assert_eq!(names, vec!["observed".to_string(), "observed-child".to_string()]);
}
