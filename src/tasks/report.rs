//! # Task status and terminal reports.
//!
//! - [`TaskStatus`]: `Pending → Running → {Completed, Failed, Cancelled}`.
//! - [`TaskValue`]: type-erased value returned by a body.
//! - [`TaskResult`]: the value, the caught error, or nothing.
//! - [`TaskReport`]: the final context delivered with `onTaskComplete`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TaskError;
use crate::key::Key;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Registered; waiting for the ready gate.
    Pending,
    /// Body is executing.
    Running,
    /// Body returned normally.
    Completed,
    /// Body returned an error or panicked.
    Failed,
    /// Cancellation was honored.
    Cancelled,
}

impl TaskStatus {
    /// `true` for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value returned by a task body, erased to `Any`.
#[derive(Clone)]
pub struct TaskValue(Arc<dyn Any + Send + Sync>);

impl TaskValue {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// The value returned by bodies that produce nothing.
    pub fn unit() -> Self {
        Self::new(())
    }

    /// Borrows the value as `T` if that is its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// `true` if the value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Short rendering for logs: strings and common scalars verbatim, other types as a marker.
    pub fn describe(&self) -> String {
        if self.is::<()>() {
            "()".to_string()
        } else if let Some(s) = self.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = self.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(n) = self.downcast_ref::<i64>() {
            n.to_string()
        } else if let Some(n) = self.downcast_ref::<u64>() {
            n.to_string()
        } else if let Some(n) = self.downcast_ref::<i32>() {
            n.to_string()
        } else if let Some(n) = self.downcast_ref::<u32>() {
            n.to_string()
        } else if let Some(n) = self.downcast_ref::<usize>() {
            n.to_string()
        } else if let Some(b) = self.downcast_ref::<bool>() {
            b.to_string()
        } else {
            "[value]".to_string()
        }
    }
}

impl fmt::Debug for TaskValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskValue({})", self.describe())
    }
}

/// Terminal result of a task.
#[derive(Debug, Clone)]
pub enum TaskResult {
    /// What the body returned (on completion, or on cancellation if the body still produced a value).
    Value(TaskValue),
    /// The error caught at the runner boundary.
    Error(Arc<TaskError>),
    /// Cancelled without a body-produced value.
    None,
}

impl TaskResult {
    /// Borrows the result value as `T`.
    pub fn value<T: Any>(&self) -> Option<&T> {
        match self {
            TaskResult::Value(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Borrows the caught error.
    pub fn error(&self) -> Option<&TaskError> {
        match self {
            TaskResult::Error(e) => Some(e),
            _ => None,
        }
    }

    /// `true` when there is no result at all.
    pub fn is_none(&self) -> bool {
        matches!(self, TaskResult::None)
    }

    /// Short rendering for logs (`undefined` when absent).
    pub fn describe(&self) -> String {
        match self {
            TaskResult::Value(v) => v.describe(),
            TaskResult::Error(e) => e.to_string(),
            TaskResult::None => "undefined".to_string(),
        }
    }
}

/// Final context of a task, delivered with `onTaskComplete`.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// Supervisor that ran the task.
    pub manager: Key,
    /// Category id.
    pub category: Key,
    /// Task id.
    pub task: Key,
    /// Terminal status.
    pub status: TaskStatus,
    /// Terminal result.
    pub result: TaskResult,
    /// Time from creation to the terminal transition.
    pub duration: Duration,
}

impl TaskReport {
    /// Shorthand for `self.result.value::<T>()`.
    pub fn value<T: Any>(&self) -> Option<&T> {
        self.result.value::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn value_downcasts() {
        let v = TaskValue::new(String::from("done"));
        assert!(v.is::<String>());
        assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("done"));
        assert_eq!(v.downcast_ref::<u32>(), None);
        assert_eq!(v.describe(), "done");
        assert_eq!(TaskValue::unit().describe(), "()");
    }

    #[test]
    fn result_accessors() {
        let err = TaskResult::Error(Arc::new(TaskError::fail("x")));
        assert!(err.error().is_some());
        assert_eq!(err.value::<()>(), None);
        assert!(TaskResult::None.is_none());
        assert_eq!(TaskResult::None.describe(), "undefined");
        assert_eq!(TaskResult::Value(TaskValue::new(3u32)).value::<u32>(), Some(&3));
    }
}
