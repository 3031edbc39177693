use std::collections::HashMap;

use tasktree::{Holder, HolderError, TaskError};

use crate::common::{scheduler, within};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tasks_share_state_through_a_holder() {
    let sched = scheduler();
    let counter = Holder::named("counter", 0u64);

    let root = sched.spawn_root({
        let counter = counter.clone();
        move |ctx| async move {
            for _ in 0..100 {
                let counter = counter.clone();
                ctx.spawn(move |_| async move {
                    counter
                        .mutate(|n| {
                            let seen = *n;
                            std::thread::yield_now();
                            *n = seen + 1;
                        })
                        .await?;
                    Ok(())
                })?;
            }
            Ok(())
        }
    });

    within(root.join()).await.expect("root");
    assert_eq!(counter.read(|n| *n).await, Ok(100));
    assert_eq!(counter.completed(), 101);
}

#[tokio::test]
async fn holder_errors_fail_the_calling_task_only() {
    let sched = scheduler();
    let accounts = Holder::named("accounts", HashMap::from([("alice", 10i64)]));

    let withdraw = |who: &'static str, amount: i64| {
        let accounts = accounts.clone();
        sched.spawn_root(move |_| async move {
            let left = accounts
                .try_mutate(move |m| {
                    let balance = m.get_mut(who).ok_or("no such account")?;
                    if *balance < amount {
                        return Err("insufficient funds");
                    }
                    *balance -= amount;
                    Ok(*balance)
                })
                .await?;
            Ok(left)
        })
    };

    let ok = withdraw("alice", 4);
    let broke = withdraw("alice", 100);
    let ghost = withdraw("bob", 1);

    assert_eq!(within(ok.join()).await, Ok(6));
    assert_eq!(
        within(broke.join()).await,
        Err(TaskError::Holder(HolderError::Operation {
            error: "insufficient funds".into()
        }))
    );
    assert!(matches!(
        within(ghost.join()).await,
        Err(TaskError::Holder(HolderError::Operation { .. }))
    ));
    assert_eq!(accounts.read(|m| m["alice"]).await, Ok(6));
}

#[tokio::test]
async fn snapshots_are_ordered_with_writes() {
    let log = Holder::named("log", Vec::<u32>::new());
    let first = log.mutate(|v| v.push(1));
    let snap = log.snapshot();
    let second = log.mutate(|v| v.push(2));

    // Awaited out of order: execution still follows submission.
    assert_eq!(second.await, Ok(()));
    assert_eq!(snap.await, Ok(vec![1]));
    assert_eq!(first.await, Ok(()));
    assert_eq!(log.snapshot().await, Ok(vec![1, 2]));
}
