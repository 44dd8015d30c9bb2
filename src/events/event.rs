//! # Lifecycle events a caller can subscribe to.
//!
//! [`Event`] is the typed key of a subscription; each variant carries exactly
//! the identifiers its family needs:
//!
//! | Event                | Key                    | Resolves when                                   |
//! |----------------------|------------------------|-------------------------------------------------|
//! | `TaskComplete`       | `(category, task)`     | the task reaches a terminal state               |
//! | `CategoryComplete`   | `category`             | the category has drained                        |
//! | `AllComplete`        | none                   | nothing is registered or pending                |
//! | `ManagerKilled`      | none                   | `kill()` is invoked                             |
//!
//! [`EventKind`] is the field-less classification, parseable from the event
//! names used in configuration and logs (`onTaskComplete`, ...).
//!
//! ## Example
//! ```rust
//! use catvisor::{Event, EventKind};
//!
//! let kind: EventKind = "onCategoryComplete".parse().unwrap();
//! let ev = Event::from_parts(kind, Some("sync".into()), None).unwrap();
//! assert_eq!(ev, Event::category_complete("sync"));
//! assert!("onSomething".parse::<EventKind>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ManagerError;
use crate::key::Key;
use crate::tasks::TaskReport;

/// Field-less event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A specific task reached a terminal state.
    TaskComplete,
    /// A category drained.
    CategoryComplete,
    /// Nothing is registered or pending.
    AllComplete,
    /// The supervisor was killed.
    ManagerKilled,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 4] = [
        EventKind::TaskComplete,
        EventKind::CategoryComplete,
        EventKind::AllComplete,
        EventKind::ManagerKilled,
    ];

    /// Event name (`onTaskComplete`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TaskComplete => "onTaskComplete",
            EventKind::CategoryComplete => "onCategoryComplete",
            EventKind::AllComplete => "onAllComplete",
            EventKind::ManagerKilled => "onManagerKilled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ManagerError::UnknownEvent {
                event: s.to_string(),
            })
    }
}

/// Subscription key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    /// `onTaskComplete[category][task]`.
    TaskComplete {
        /// Category id.
        category: Key,
        /// Task id.
        task: Key,
    },
    /// `onCategoryComplete[category]`.
    CategoryComplete {
        /// Category id.
        category: Key,
    },
    /// `onAllComplete`.
    AllComplete,
    /// `onManagerKilled`.
    ManagerKilled,
}

impl Event {
    /// Shorthand for [`Event::TaskComplete`].
    pub fn task_complete(category: impl Into<Key>, task: impl Into<Key>) -> Self {
        Event::TaskComplete {
            category: category.into(),
            task: task.into(),
        }
    }

    /// Shorthand for [`Event::CategoryComplete`].
    pub fn category_complete(category: impl Into<Key>) -> Self {
        Event::CategoryComplete {
            category: category.into(),
        }
    }

    /// Classification of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TaskComplete { .. } => EventKind::TaskComplete,
            Event::CategoryComplete { .. } => EventKind::CategoryComplete,
            Event::AllComplete => EventKind::AllComplete,
            Event::ManagerKilled => EventKind::ManagerKilled,
        }
    }

    /// Builds an event from a kind and loose identifiers.
    ///
    /// Fails with [`ManagerError::Validation`] when the kind needs an identifier
    /// that is absent or empty. Identifiers a kind does not use are ignored.
    pub fn from_parts(
        kind: EventKind,
        category: Option<Key>,
        task: Option<Key>,
    ) -> Result<Self, ManagerError> {
        let present = |k: &Option<Key>| k.as_ref().is_some_and(|k| !k.is_empty());
        match kind {
            EventKind::TaskComplete if present(&category) && present(&task) => {
                Ok(Event::TaskComplete {
                    category: category.unwrap_or_else(missing),
                    task: task.unwrap_or_else(missing),
                })
            }
            EventKind::CategoryComplete if present(&category) => Ok(Event::CategoryComplete {
                category: category.unwrap_or_else(missing),
            }),
            EventKind::TaskComplete | EventKind::CategoryComplete => {
                Err(ManagerError::Validation {
                    category: category.unwrap_or_else(missing),
                    task: task.unwrap_or_else(missing),
                })
            }
            EventKind::AllComplete => Ok(Event::AllComplete),
            EventKind::ManagerKilled => Ok(Event::ManagerKilled),
        }
    }
}

fn missing() -> Key {
    Key::from("")
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::TaskComplete { category, task } => {
                write!(f, "{}[{category}.{task}]", self.kind())
            }
            Event::CategoryComplete { category } => write!(f, "{}[{category}]", self.kind()),
            Event::AllComplete | Event::ManagerKilled => write!(f, "{}", self.kind()),
        }
    }
}

/// Payload an event resolves with.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Final context of the task.
    TaskComplete(Arc<TaskReport>),
    /// The drained category.
    CategoryComplete {
        /// Category id.
        category: Key,
    },
    /// Everything drained.
    AllComplete,
    /// The supervisor was killed.
    ManagerKilled {
        /// Id of the killed supervisor.
        manager: Key,
        /// Position in the process-wide kill order (monotonic).
        seq: u64,
    },
}

impl Notification {
    /// The task report, for `TaskComplete` notifications.
    pub fn report(&self) -> Option<&Arc<TaskReport>> {
        match self {
            Notification::TaskComplete(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_event_name() {
        let err = "onTaskCancelled".parse::<EventKind>().expect_err("unknown");
        assert_eq!(err.as_label(), "manager_unknown_event");
    }

    #[test]
    fn from_parts_requires_keys() {
        assert!(Event::from_parts(EventKind::TaskComplete, Some("c".into()), None).is_err());
        assert!(Event::from_parts(EventKind::TaskComplete, Some("c".into()), Some("".into())).is_err());
        assert!(Event::from_parts(EventKind::CategoryComplete, None, None).is_err());
        assert_eq!(
            Event::from_parts(EventKind::TaskComplete, Some("c".into()), Some("t".into())),
            Ok(Event::task_complete("c", "t"))
        );
        assert_eq!(
            Event::from_parts(EventKind::AllComplete, Some("ignored".into()), None),
            Ok(Event::AllComplete)
        );
    }

    #[test]
    fn display_includes_keys() {
        assert_eq!(Event::task_complete("a", "b").to_string(), "onTaskComplete[a.b]");
        assert_eq!(Event::ManagerKilled.to_string(), "onManagerKilled");
    }
}
