//! # tasktree
//!
//! **tasktree** is a small structured-concurrency layer for Tokio.
//!
//! It provides two primitives:
//! - a **task-tree scheduler**: root tasks spawn children and groups, parents
//!   never finish before their children, cancellation flows from a parent to
//!   every existing and future descendant, and priorities drive admission of
//!   root tasks;
//! - an **isolated state holder**: mutable state reachable only through
//!   queued operations that run one at a time.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   spawn_root(work)        spawn_group(group)        spawn_root_with_timeout(d, work)
//!          │                        │                               │
//!          ▼                        ▼                               ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  Scheduler                                                            │
//! │  - Registry (task forest: parents, children, live counts, failures)   │
//! │  - AdmissionGate (roots only; priority order with aging)              │
//! │  - Bus (broadcast events) ──► SubscriberSet (per-subscriber queues)   │
//! │  - runtime token (parent of every root token)                         │
//! └──────┬───────────────────────────┬──────────────────────────┬─────────┘
//!        ▼                           ▼                          ▼
//!   root task                   group task                 timeout task
//!   body(TaskContext)           ├─ member #0               ├─ work
//!   ├─ ctx.spawn(child)         ├─ member #1               └─ timer
//!   │    └─ ctx.spawn(..)       └─ member #N
//!   └─ ctx.spawn_group(..)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Pending ──► [root: wait for admission] ──► Running ──► body returns ──► Joining
//!    │                                                                      │
//!    └── cancelled before start ──► Cancelled           wait for every child
//!                                                                            ▼
//!                                       Succeeded | Failed(error) | Cancelled
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                          |
//! |-------------------|----------------------------------------------------------------|---------------------------------------------|
//! | **Task trees**    | Roots, children, structured join, cooperative cancellation.    | [`Scheduler`], [`TaskContext`], [`TaskHandle`] |
//! | **Groups**        | Fan-out / fan-in with fail-fast or collect-all aggregation.    | [`TaskGroup`], [`GroupPolicy`], [`GroupHandle`] |
//! | **Holders**       | Serialized access to shared state.                             | [`Holder`], [`HolderCall`]                  |
//! | **Subscriber API**| Hook into task lifecycle events (logging, metrics).            | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for tasks, holders and the scheduler.             | [`TaskError`], [`HolderError`], [`RuntimeError`] |
//! | **Configuration** | Centralized scheduler settings.                                | [`SchedulerConfig`]                         |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tasktree::{Holder, Scheduler, SchedulerConfig, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn tasktree::Subscribe>> = vec![Arc::new(tasktree::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn tasktree::Subscribe>> = Vec::new();
//!
//!     let sched = Scheduler::builder(SchedulerConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!     let hits = Holder::named("hits", 0u32);
//!
//!     let root = sched.spawn_root({
//!         let hits = hits.clone();
//!         move |ctx| async move {
//!             for i in 0..3u64 {
//!                 let hits = hits.clone();
//!                 ctx.spawn(move |c| async move {
//!                     c.sleep(Duration::from_millis(10 * i)).await?;
//!                     hits.mutate(|n| *n += 1).await?;
//!                     Ok::<_, TaskError>(())
//!                 })?;
//!             }
//!             Ok("spawned")
//!         }
//!     });
//!
//!     // The root resolves only after its three children.
//!     assert_eq!(root.join().await?, "spawned");
//!     assert_eq!(hits.read(|n| *n).await?, 3);
//!     sched.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod holder;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{
    Awaitable, Cancellable, CancelledSpawn, GroupHandle, GroupPolicy, Scheduler,
    SchedulerBuilder, SchedulerConfig, TaskContext, TaskGroup, TaskHandle, TaskInfo,
};
pub use error::{HolderError, MemberFailure, ParentRejection, RuntimeError, TaskError};
pub use events::{Event, EventKind};
pub use holder::{Holder, HolderCall};
pub use subscribers::Subscribe;
pub use tasks::{BoxWork, Priority, SpawnOptions, TaskId, TaskState};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
