//! # Isolated state holders.
//!
//! A [`Holder`] owns a value and exposes it only through queued operations
//! executed one at a time by a dedicated worker task.
//!
//! ## Architecture
//! ```text
//! Holder (clone 1) ──┐
//! Holder (clone 2) ──┼── mpsc (unbounded, FIFO) ──► drain worker ── op(&mut state)
//! Holder (clone N) ──┘                                   │
//!                                                        └─► oneshot ──► HolderCall (caller)
//! ```
//!
//! ## Rules
//! - **Exclusive**: at most one operation body runs at any instant per holder.
//! - **FIFO by admission**: an operation is queued when `read`/`mutate` is
//!   *called*, not when the returned [`HolderCall`] is first polled.
//! - **Isolated failures**: an error or panic inside an operation is returned
//!   only to its caller; the holder stays usable. Changes made by a panicking
//!   operation before it panicked are kept.
//! - **No reentrancy**: operations are synchronous closures and cannot await
//!   the holder they run on.
//! - The state is dropped once every clone is dropped and the queue is drained.

mod call;
mod isolated;

pub use call::HolderCall;
pub use isolated::Holder;
