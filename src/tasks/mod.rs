//! # Task identity, priority, state and spawn options.
//!
//! This module provides the plain data types shared by the scheduler:
//! - [`TaskId`] - process-unique task identity
//! - [`Priority`] - ordered, advisory scheduling hint
//! - [`TaskState`] - externally observable completion state
//! - [`SpawnOptions`] - per-spawn name/priority overrides
//! - [`BoxWork`] - type-erased task body used by groups

mod id;
mod priority;
mod spec;
mod state;
mod work;

pub use id::TaskId;
pub use priority::Priority;
pub use spec::SpawnOptions;
pub use state::TaskState;
pub use work::BoxWork;

pub(crate) use state::Progress;
pub(crate) use work::boxed;
