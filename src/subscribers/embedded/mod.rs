//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders lifecycle records through `tracing`.

mod log;

pub use log::LogWriter;
