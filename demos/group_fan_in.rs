//! # Example: group_fan_in
//!
//! Fan-out / fan-in with [`TaskGroup`].
//!
//! Shows how to:
//! - Run independent lookups as one collect-all group and inspect every failure.
//! - Run a fail-fast group where the first error stops the siblings.
//! - Bound a slow lookup with [`TaskContext::spawn_with_timeout`].
//!
//! ## Run
//! ```bash
//! cargo run --example group_fan_in
//! ```

use std::time::Duration;

use tasktree::{GroupPolicy, Scheduler, SchedulerConfig, TaskContext, TaskError, TaskGroup};

async fn lookup(ctx: TaskContext, shard: u64) -> Result<u64, TaskError> {
    ctx.sleep(Duration::from_millis(20 * shard)).await?;
    if shard % 3 == 2 {
        return Err(TaskError::fail(format!("shard {shard} unavailable")));
    }
    Ok(shard * 100)
}

fn shards(policy: GroupPolicy) -> TaskGroup<u64> {
    let mut group = TaskGroup::new(policy);
    for shard in 0..6u64 {
        group.add(move |ctx| lookup(ctx, shard));
    }
    group
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let sched = Scheduler::builder(SchedulerConfig::default()).build();

    println!("=== collect-all ===");
    match sched.spawn_group(shards(GroupPolicy::CollectAll)).join().await {
        Ok(values) => println!("all shards answered: {values:?}"),
        Err(TaskError::Group { failures }) => {
            for f in failures {
                println!("member #{} ({}) failed: {}", f.index, f.task, f.error);
            }
        }
        Err(e) => println!("unexpected: {e}"),
    }

    println!("=== fail-fast ===");
    let res = sched.spawn_group(shards(GroupPolicy::FailFast)).join().await;
    println!("fail-fast outcome: {res:?}");

    println!("=== bounded lookup ===");
    let bounded = sched.spawn_root(|ctx| async move {
        let slow = ctx.spawn_with_timeout(Duration::from_millis(50), |c| lookup(c, 10))?;
        match slow.join().await {
            Err(TaskError::Timeout { timeout }) => println!("shard 10 gave up after {timeout:?}"),
            other => println!("shard 10: {other:?}"),
        }
        ctx.cancel_children();
        Ok(())
    });
    // The timed-out child still counts as a failed child of `bounded`.
    println!("bounded root: {:?}", bounded.join().await);

    sched.shutdown().await?;
    Ok(())
}
