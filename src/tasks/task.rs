//! # Task abstraction.
//!
//! This module defines the [`Task`] trait: an opaque, cancelable body that
//! produces a fresh future per [`spawn`](Task::spawn). The common handle type is
//! [`TaskRef`], an `Arc<dyn Task>` suitable for sharing across the runtime.
//!
//! A body receives a [`CancellationToken`] and should watch it to stop
//! cooperatively. Cancellation never interrupts a body mid-step: whatever the
//! body does after observing the token is its cleanup, and the supervisor waits
//! for it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::report::TaskValue;

/// Boxed future returned by [`Task::spawn`].
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<TaskValue, TaskError>> + Send + 'static>>;

/// Shared handle to a task body.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable body.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use catvisor::{BoxTaskFuture, Task, TaskValue};
///
/// struct Heartbeat;
///
/// impl Task for Heartbeat {
///     fn spawn(&self, ctx: CancellationToken) -> BoxTaskFuture {
///         Box::pin(async move {
///             ctx.cancelled().await;
///             Ok(TaskValue::new("stopped"))
///         })
///     }
/// }
/// ```
pub trait Task: Send + Sync + 'static {
    /// Creates the future for one execution of the body.
    ///
    /// Implementations should watch `ctx` and return promptly once it is cancelled.
    fn spawn(&self, ctx: CancellationToken) -> BoxTaskFuture;
}
