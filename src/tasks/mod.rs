//! # Task abstractions, handles and reports.
//!
//! - [`Task`] - trait for async cancelable bodies
//! - [`TaskFn`] - closure-backed body
//! - [`TaskRef`] - shared reference to a body (`Arc<dyn Task>`)
//! - [`TaskHandle`] - one registered, in-flight task
//! - [`TaskStatus`], [`TaskResult`], [`TaskReport`], [`TaskValue`] - lifecycle and outcome

mod handle;
mod report;
mod task;
mod task_fn;

pub use handle::TaskHandle;
pub use report::{TaskReport, TaskResult, TaskStatus, TaskValue};
pub use task::{BoxTaskFuture, Task, TaskRef};
pub use task_fn::TaskFn;
