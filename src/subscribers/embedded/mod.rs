//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders bus messages as `tracing` events (demo/debug).

mod log;

pub use log::LogWriter;
