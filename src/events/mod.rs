//! Lifecycle events: subscription keys, payloads, descriptors and log records.
//!
//! ## Contents
//! - [`Event`], [`EventKind`], [`Notification`]: what can be awaited and what it resolves with
//! - [`Subscription`]: shared awaitable view of one pending event
//! - [`LogRecord`], [`CategorySnapshot`]: lifecycle records fanned out to subscribers
//! - `Dispatcher` (crate-internal): descriptor index and completion rollup
//!
//! ## Quick reference
//! - **Producers**: `Supervisor::finish` (task completion), cleanup watchers
//!   (category/all rollup), `Supervisor::kill` (`onManagerKilled`).
//! - **Consumers**: callers awaiting a [`Subscription`], the kill watcher, and
//!   `create` when it waits for a replaced task.

mod deferred;
mod dispatcher;
mod event;
mod record;

pub(crate) use dispatcher::Dispatcher;
pub use deferred::{Settled, Subscription};
pub use event::{Event, EventKind, Notification};
pub use record::{CategorySnapshot, LogRecord};
