//! # Built-in subscribers
//!
//! - [`LogWriter`]: logs every bus event through `tracing` (demo/debug).

mod log;

pub use log::LogWriter;
