//! # Lifecycle log records.
//!
//! A [`LogRecord`] is produced by the supervisor at each lifecycle milestone
//! (construction, task creation, completion, cancellation, failure, kill) when
//! [`Config::log`](crate::Config::log) is enabled, and fanned out to every
//! [`Subscribe`](crate::Subscribe) implementation registered on the supervisor.
//!
//! Every record carries a snapshot of the registry taken at the moment it was
//! produced, so a reader can see which categories and tasks were still alive.
//!
//! ## Rendering
//! ```text
//! 📟 [catvisor] | uploads | INFO | Task Complete
//!   category: "photos"
//!   id: "p-17"
//!   duration: 1.2s
//!   result: "ok"
//!   Active Categories: 1
//!     photos | Running Tasks: 2 | ["p-18", "p-19"]
//!   Total Running Tasks: 2
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tracing::Level;

use crate::key::Key;

/// Global sequence counter for records.
static RECORD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Tasks registered in one category at the time a record was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySnapshot {
    /// Category id.
    pub category: Key,
    /// Task ids, sorted.
    pub tasks: Vec<Key>,
}

/// One lifecycle log record.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Monotonic sequence number (process-wide).
    pub seq: u64,
    /// Wall-clock time of creation.
    pub at: SystemTime,
    /// Severity; renderers map it onto their own levels.
    pub level: Level,
    /// Id of the supervisor that produced the record.
    pub manager: Key,
    /// Display name of the supervisor.
    pub name: String,
    /// Prefix icon.
    pub icon: String,
    /// Headline.
    pub message: Cow<'static, str>,
    /// Ordered structured entries.
    pub entries: Vec<(Cow<'static, str>, String)>,
    /// Registry contents when the record was produced.
    pub snapshot: Vec<CategorySnapshot>,
    /// Render on one line instead of one line per entry.
    pub collapsed: bool,
}

impl LogRecord {
    /// Creates a record with the next sequence number and no entries.
    pub fn new(level: Level, manager: Key, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            seq: RECORD_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            level,
            name: manager.to_string(),
            manager,
            icon: String::new(),
            message: message.into(),
            entries: Vec::new(),
            snapshot: Vec::new(),
            collapsed: true,
        }
    }

    /// Appends a structured entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        self.entries.push((key.into(), value.to_string()));
        self
    }

    /// Looks up the first entry named `key`.
    pub fn entry(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Total number of tasks in the snapshot.
    pub fn running_tasks(&self) -> usize {
        self.snapshot.iter().map(|c| c.tasks.len()).sum()
    }

    /// `{icon} [catvisor] | {name} | {LEVEL} | {message}`.
    pub fn headline(&self) -> String {
        let icon = if self.icon.is_empty() {
            String::new()
        } else {
            format!("{} ", self.icon)
        };
        format!(
            "{icon}[catvisor] | {} | {} | {}",
            self.name, self.level, self.message
        )
    }
}
