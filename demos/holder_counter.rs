//! # Example: holder_counter
//!
//! Shared state without locks: many tasks update one [`Holder`].
//!
//! Operations run one at a time in submission order, so the read-modify-write
//! below never loses an update even on a multi-threaded runtime.
//!
//! ## Run
//! ```bash
//! cargo run --example holder_counter
//! ```

use std::collections::BTreeMap;

use tasktree::{Holder, HolderError, Scheduler, SchedulerConfig, TaskError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let sched = Scheduler::builder(SchedulerConfig::default()).build();
    let words: Holder<BTreeMap<String, usize>> = Holder::named("words", BTreeMap::new());

    let text = "the quick brown fox jumps over the lazy dog the end";
    let root = sched.spawn_root({
        let words = words.clone();
        move |ctx| async move {
            for word in text.split_whitespace() {
                let words = words.clone();
                ctx.spawn(move |_| async move {
                    words
                        .mutate(move |m| *m.entry(word.to_string()).or_default() += 1)
                        .await?;
                    Ok(())
                })?;
            }
            Ok(())
        }
    });
    root.join().await?;

    let top = words
        .read(|m| m.iter().max_by_key(|(_, n)| **n).map(|(w, n)| (w.clone(), *n)))
        .await?;
    println!("most frequent: {top:?}");

    // A failing operation reaches only its caller; the state stays usable.
    let res: Result<usize, HolderError> = words
        .try_mutate(|m| m.remove("cat").ok_or("no cat"))
        .await;
    println!("remove(cat): {res:?}");

    let checked = sched.spawn_root({
        let words = words.clone();
        move |_| async move {
            let n = words
                .try_read(|m| m.get("dog").copied().ok_or("no dog"))
                .await?;
            Ok::<_, TaskError>(n)
        }
    });
    println!("dog: {:?}", checked.join().await);
    println!("operations executed: {}", words.completed());

    sched.shutdown().await?;
    Ok(())
}
