//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the scheduler, the runner and
//! subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scheduler` (spawn, reject, shutdown), `runner` (lifecycle),
//!   `TaskHandle::cancel`, the timeout timer, `SubscriberSet` workers.
//! - **Consumers**: the scheduler's subscriber listener (fans out to
//!   `SubscriberSet`) and any receiver from `Scheduler::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
