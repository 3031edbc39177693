//! Runtime core: task trees, scheduling and lifecycle.
//!
//! The public API from this module is [`Scheduler`] (built through
//! [`SchedulerBuilder`]), the [`TaskContext`] handed to every body, the
//! [`TaskHandle`] returned by every spawn and [`TaskGroup`].
//!
//! Internal modules:
//! - [`registry`]: the task forest (parents, children, live counts, first failures);
//! - [`runner`]: drives one task from admission to its terminal state;
//! - [`launch`]: defers child launches until the parent's poll returns;
//! - [`gate`]: priority admission with aging for root tasks;
//! - [`group`]: fail-fast / collect-all aggregation, race and timeout;
//! - [`scheduler`]: spawning entry points, cancellation, snapshots, shutdown.

mod builder;
mod config;
mod context;
mod gate;
mod group;
mod handle;
mod launch;
mod registry;
mod runner;
mod scheduler;

pub use builder::SchedulerBuilder;
pub use config::{CancelledSpawn, SchedulerConfig};
pub use context::TaskContext;
pub use group::{GroupPolicy, TaskGroup};
pub use handle::{Awaitable, Cancellable, GroupHandle, TaskHandle};
pub use registry::TaskInfo;
pub use scheduler::Scheduler;
