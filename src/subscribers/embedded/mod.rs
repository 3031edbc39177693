//! # Built-in subscribers
//!
//! - [`LogWriter`]: forwards events to `tracing` (demo/debug).

mod log;

pub use log::LogWriter;
