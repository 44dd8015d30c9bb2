//! Error types used by the catvisor runtime and task bodies.
//!
//! This module defines two main error enums:
//!
//! - [`ManagerError`]: errors raised by the supervisor itself (validation,
//!   lifecycle, registry conflicts, subscriptions).
//! - [`TaskError`]: errors raised by individual task bodies. These never leave
//!   the runner: they are recorded as the task's terminal result.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logs.
//! [`ManagerError::severity`] feeds the silent policy (see [`Silence`](crate::Silence)).

use std::fmt;

use thiserror::Error;

use crate::key::Key;

/// How loudly a creation-time error should be surfaced.
///
/// Only [`Severity::Critical`] errors survive [`Silence::NonCritical`](crate::Silence::NonCritical).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Conflicts the caller can reasonably expect (e.g. duplicate key with overwrite disabled).
    Error,
    /// Programming errors (missing keys, registry invariant violations).
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

/// # Errors produced by the supervisor.
///
/// `Clone` because subscription futures are shared between every waiter of
/// the same event and each of them receives its own copy of the outcome.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// `create` was called with a missing category or task id.
    #[error("tasks must have a category and an id at a minimum but received {category}.{task}")]
    Validation {
        /// Category id as received.
        category: Key,
        /// Task id as received.
        task: Key,
    },

    /// The supervisor was killed and no longer accepts tasks.
    #[error("task manager {manager} is no longer active and can not create task {category}.{task}")]
    InactiveManager {
        /// Id of the killed supervisor.
        manager: Key,
        /// Category of the rejected task.
        category: Key,
        /// Id of the rejected task.
        task: Key,
    },

    /// A running task already occupies the key and overwrite is disabled.
    #[error(
        "when overwrite is disabled, tasks must be cancelled before scheduling them again: {category}.{task}"
    )]
    TaskAlreadyExists {
        /// Occupied category.
        category: Key,
        /// Occupied task id.
        task: Key,
    },

    /// The registry refused to store a handle over an occupied entry.
    #[error("failed to save task {category}.{task} as it already exists")]
    DuplicateTask {
        /// Occupied category.
        category: Key,
        /// Occupied task id.
        task: Key,
    },

    /// A subscription referenced a category or task that does not exist.
    #[error("can not subscribe to {event} for {target} as it does not exist")]
    NotFound {
        /// Event name (`onTaskComplete`, `onCategoryComplete`).
        event: &'static str,
        /// Rendered `category` or `category.task`.
        target: String,
    },

    /// A subscription used an event name that is not known.
    #[error(
        "event {event:?} is not a valid event; valid events are onTaskComplete, onCategoryComplete, onAllComplete, onManagerKilled"
    )]
    UnknownEvent {
        /// The rejected event name.
        event: String,
    },

    /// A descriptor was rejected explicitly through the dispatcher.
    #[error("event {event} rejected: {reason}")]
    Rejected {
        /// Event name.
        event: &'static str,
        /// Reason passed to the rejection.
        reason: String,
    },

    /// The supervisor was dropped before the awaited event could be settled.
    #[error("supervisor dropped before {event} was settled")]
    Dropped {
        /// Event name.
        event: &'static str,
    },
}

impl ManagerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use catvisor::{Key, ManagerError};
    ///
    /// let err = ManagerError::TaskAlreadyExists { category: Key::from("a"), task: Key::from("b") };
    /// assert_eq!(err.as_label(), "manager_task_already_exists");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ManagerError::Validation { .. } => "manager_validation",
            ManagerError::InactiveManager { .. } => "manager_inactive",
            ManagerError::TaskAlreadyExists { .. } => "manager_task_already_exists",
            ManagerError::DuplicateTask { .. } => "manager_duplicate_task",
            ManagerError::NotFound { .. } => "manager_not_found",
            ManagerError::UnknownEvent { .. } => "manager_unknown_event",
            ManagerError::Rejected { .. } => "manager_rejected",
            ManagerError::Dropped { .. } => "manager_dropped",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ManagerError::Validation { category, task } => {
                format!("missing key: {category}.{task}")
            }
            ManagerError::InactiveManager { manager, .. } => format!("inactive manager: {manager}"),
            ManagerError::TaskAlreadyExists { category, task } => {
                format!("task exists: {category}.{task}")
            }
            ManagerError::DuplicateTask { category, task } => {
                format!("duplicate task: {category}.{task}")
            }
            ManagerError::NotFound { event, target } => format!("{event}: {target} not found"),
            ManagerError::UnknownEvent { event } => format!("unknown event: {event}"),
            ManagerError::Rejected { event, reason } => format!("{event} rejected: {reason}"),
            ManagerError::Dropped { event } => format!("{event} dropped"),
        }
    }

    /// Severity used by the silent policy.
    pub fn severity(&self) -> Severity {
        match self {
            ManagerError::TaskAlreadyExists { .. } => Severity::Error,
            _ => Severity::Critical,
        }
    }
}

/// # Errors produced by task bodies.
///
/// The runner catches every one of these; they end up in
/// [`TaskResult::Error`](crate::TaskResult::Error) and in the log, never in the caller's stack.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Body failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Body observed its cancellation token and bailed out without a value.
    #[error("context cancelled")]
    Canceled,

    /// Body panicked; the panic was caught at the runner boundary.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`] from anything printable.
    pub fn fail(error: impl fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use catvisor::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
            TaskError::Panicked { info } => format!("panic: {info}"),
        }
    }
}
