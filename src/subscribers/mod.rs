//! # Log record subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Supervisor ── LogRecord ──► SubscriberSet ──┬──► [queue] ──► LogWriter::on_record
//!   (create, finish,                          ├──► [queue] ──► Custom::on_record
//!    cleanup, kill)                           └──► ...
//! ```
//!
//! Records are only produced when [`Config::log`](crate::Config::log) is on.
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use catvisor::{LogRecord, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_record(&self, record: &LogRecord) {
//!         if record.level == tracing::Level::ERROR {
//!             // page someone
//!         }
//!     }
//! }
//! ```

mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
mod embedded;

pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
pub(crate) use subscriber_set::panic_message;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
