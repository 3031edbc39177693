use std::time::Duration;

use tasktree::{GroupPolicy, Priority, SpawnOptions, TaskError, TaskGroup};

use crate::common::{eventually, scheduler, within};

#[tokio::test]
async fn fail_fast_surfaces_the_first_error_and_stops_everyone() {
    let sched = scheduler();
    let mut group = TaskGroup::new(GroupPolicy::FailFast);
    group
        .add(|ctx| async move {
            ctx.sleep(Duration::from_millis(10)).await?;
            Err(TaskError::fail("first"))
        })
        .add(|ctx| async move {
            ctx.cancelled().await;
            Err(TaskError::Cancelled)
        })
        .add(|ctx| async move {
            ctx.sleep(Duration::from_millis(30)).await?;
            Err(TaskError::fail("second"))
        })
        .add(|_| async { Ok(3u32) });

    let handle = sched.spawn_group(group);
    assert_eq!(within(handle.join()).await, Err(TaskError::fail("first")));
    assert_eq!(sched.live(), 0, "every member is terminal once the group resolves");
}

#[tokio::test]
async fn fail_fast_returns_values_in_insertion_order() {
    let sched = scheduler();
    let mut group = TaskGroup::new(GroupPolicy::FailFast);
    for i in 0..4u64 {
        group.add(move |ctx| async move {
            ctx.sleep(Duration::from_millis(5 * (4 - i))).await?;
            Ok(i)
        });
    }
    assert_eq!(within(sched.spawn_group(group).join()).await, Ok(vec![0, 1, 2, 3]));
}

#[tokio::test]
async fn collect_all_reports_every_member_once() {
    let sched = scheduler();
    let mut group = TaskGroup::new(GroupPolicy::CollectAll);
    group
        .add(|ctx| async move {
            ctx.sleep(Duration::from_millis(20)).await?;
            Ok(1)
        })
        .add(|_| async { Err(TaskError::fail("two")) })
        .add(|ctx| async move {
            ctx.sleep(Duration::from_millis(5)).await?;
            Err(TaskError::fail("three"))
        })
        .add(|_| async { Ok(4) });

    match within(sched.spawn_group(group).join()).await {
        Err(TaskError::Group { failures }) => {
            let indexes: Vec<usize> = failures.iter().map(|f| f.index).collect();
            assert_eq!(indexes, vec![1, 2]);
            assert_eq!(failures[0].error, TaskError::fail("two"));
            assert_eq!(failures[1].error, TaskError::fail("three"));
            assert_ne!(failures[0].task, failures[1].task);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(sched.live(), 0);
}

#[tokio::test]
async fn collect_all_success_keeps_insertion_order() {
    let sched = scheduler();
    let mut group = TaskGroup::new(GroupPolicy::CollectAll);
    for name in ["a", "b", "c"] {
        group.add(move |ctx| async move {
            ctx.yield_now().await?;
            Ok(name.to_string())
        });
    }
    assert_eq!(
        within(sched.spawn_group(group).join()).await,
        Ok(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
}

#[tokio::test]
async fn empty_group_resolves_immediately() {
    let sched = scheduler();
    let group: TaskGroup<()> = TaskGroup::new(GroupPolicy::CollectAll);
    assert_eq!(within(sched.spawn_group(group).join()).await, Ok(vec![]));
}

#[tokio::test]
async fn cancelling_a_group_cascades_to_members() {
    let sched = scheduler();
    for policy in [GroupPolicy::FailFast, GroupPolicy::CollectAll] {
        let mut group = TaskGroup::new(policy);
        for _ in 0..3 {
            group.add(|ctx| async move {
                ctx.cancelled().await;
                Err::<(), _>(TaskError::Cancelled)
            });
        }
        let handle = sched.spawn_group(group);
        eventually(|| sched.live() == 4).await;
        handle.cancel();
        assert_eq!(within(handle.join()).await, Err(TaskError::Cancelled), "{policy:?}");
    }
    assert_eq!(sched.live(), 0);
}

#[tokio::test]
async fn nested_group_members_inherit_or_override_priority() {
    let sched = scheduler();
    let root = sched.spawn_root_with(
        SpawnOptions::named("owner").with_priority(Priority::Low),
        |ctx| async move {
            let mut group = TaskGroup::new(GroupPolicy::FailFast);
            group
                .add(|c| async move { Ok(c.priority()) })
                .add_with_priority(Priority::Critical, |c| async move { Ok(c.priority()) });
            ctx.spawn_group(group)?.join().await
        },
    );
    assert_eq!(
        within(root.join()).await,
        Ok(vec![Priority::Low, Priority::Critical])
    );
}

#[tokio::test]
async fn group_failure_propagates_through_its_parent() {
    let sched = scheduler();
    let root = sched.spawn_root(|ctx| async move {
        let mut group = TaskGroup::new(GroupPolicy::CollectAll);
        group.add(|_| async { Err::<(), _>(TaskError::fail("member")) });
        let handle = ctx.spawn_group(group)?;
        Ok(handle.id())
    });

    match within(root.join()).await {
        Err(TaskError::ChildFailure { source, .. }) => {
            assert!(matches!(*source, TaskError::Group { ref failures } if failures.len() == 1));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
