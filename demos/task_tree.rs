//! # Example: task_tree
//!
//! Demonstrates a small task tree with cancellation and structured join.
//!
//! Shows how to:
//! - Spawn a root that fans out into children and grandchildren.
//! - Cancel individual subtrees with [`Scheduler::cancel`].
//! - Watch the lifecycle through the built-in [`LogWriter`].
//!
//! ## Flow
//! ```text
//! crawler (root)
//!   ├─► page-0 ── page-0/links
//!   ├─► page-1 ── page-1/links
//!   ├─► page-2 ── page-2/links
//!   └─► watchdog: after 150ms cancels whatever is still running
//! crawler resolves once every descendant is terminal
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=tasktree=debug cargo run --example task_tree --features logging
//! ```

use std::{sync::Arc, time::Duration};

use tasktree::{
    LogWriter, Priority, Scheduler, SchedulerConfig, SpawnOptions, Subscribe, TaskContext,
    TaskError,
};
use tracing_subscriber::EnvFilter;

async fn crawl(ctx: TaskContext, page: u64) -> Result<usize, TaskError> {
    ctx.spawn_with(
        SpawnOptions::named(format!("page-{page}/links")),
        move |c| async move {
            c.sleep(Duration::from_millis(40 * (page + 1))).await?;
            Ok(page as usize * 10)
        },
    )?
    .join()
    .await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tasktree=debug".into()))
        .init();

    let mut cfg = SchedulerConfig::default();
    cfg.grace = Duration::from_secs(2);

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sched = Scheduler::builder(cfg).with_subscribers(subs).build();

    let crawler = sched.spawn_root_with(
        SpawnOptions::named("crawler").with_priority(Priority::High),
        |ctx| async move {
            let mut pages = Vec::new();
            for page in 0..3u64 {
                pages.push(ctx.spawn_with(
                    SpawnOptions::named(format!("page-{page}")),
                    move |c| crawl(c, page),
                )?);
            }

            ctx.spawn_with(SpawnOptions::named("watchdog"), |c| async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                let parent = c.scheduler().snapshot().into_iter().find(|t| t.name == "crawler");
                if let Some(parent) = parent {
                    for id in parent.children {
                        if id != c.id() {
                            c.scheduler().cancel(id);
                        }
                    }
                }
                Ok(0)
            })?;

            let mut found = 0;
            for page in pages {
                match page.join().await {
                    Ok(n) => found += n,
                    Err(e) if e.is_cancelled() => println!("{} was cancelled", page.name()),
                    Err(e) => return Err(e),
                }
            }
            Ok(found)
        },
    );

    match crawler.join().await {
        Ok(found) => println!("crawler found {found} links"),
        Err(e) => println!("crawler ended with: {e}"),
    }

    sched.shutdown().await?;
    Ok(())
}
