//! # Event subscribers for the scheduler.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and built-in implementations for handling events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Runner ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!                                                     ┌────┴─────┬─────────┐
//!                                                     ▼          ▼         ▼
//!                                                 LogWriter   Metrics    Custom
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
