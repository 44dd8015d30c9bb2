//! # Per-supervisor configuration.
//!
//! [`Config`] groups the settings a supervisor is built with. All fields are
//! public; [`Default`] gives the behavior described on each field.
//!
//! ## Sentinel values
//! - `name = None` → the supervisor id is used as display name
//! - `cancel_grace = None` → cancelled tasks are awaited for as long as they take
//! - `subscriber_capacity = 0` → treated as 1

use std::time::Duration;

use crate::error::Severity;

/// Which creation-time errors are swallowed instead of returned.
///
/// A swallowed error makes [`Supervisor::create`](crate::Supervisor::create)
/// return `Ok(None)`. Errors from a killed supervisor are never swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Silence {
    /// Every error is returned.
    #[default]
    Off,
    /// Only [`Severity::Critical`] errors are returned.
    NonCritical,
    /// Nothing is returned.
    All,
}

impl Silence {
    /// `true` if an error of `severity` must not reach the caller.
    pub fn suppresses(self, severity: Severity) -> bool {
        match self {
            Silence::Off => false,
            Silence::NonCritical => severity != Severity::Critical,
            Silence::All => true,
        }
    }
}

impl From<bool> for Silence {
    fn from(silent: bool) -> Self {
        if silent {
            Silence::NonCritical
        } else {
            Silence::Off
        }
    }
}

/// Settings for one supervisor.
#[derive(Clone, Debug)]
pub struct Config {
    /// Display name used in log records.
    pub name: Option<String>,

    /// What `create` does when a running task already holds the key.
    ///
    /// - `true`: cancel it, wait for its completion, then start the new one
    /// - `false`: refuse with [`ManagerError::TaskAlreadyExists`](crate::ManagerError::TaskAlreadyExists)
    pub overwrite: bool,

    /// Error suppression policy for `create`.
    pub silent: Silence,

    /// Produce lifecycle [`LogRecord`](crate::LogRecord)s.
    pub log: bool,

    /// Render records on one line (`true`) or one line per entry (`false`).
    pub log_collapsed: bool,

    /// Prefix shown in front of every record.
    pub icon: String,

    /// Upper bound on how long a cancelled body may keep running.
    ///
    /// When the grace expires the body is dropped and the task ends as
    /// `Cancelled` with no result.
    pub cancel_grace: Option<Duration>,

    /// Upper bound for every subscriber queue.
    pub subscriber_capacity: usize,
}

impl Config {
    /// Returns the display name, falling back to `id`.
    pub fn display_name(&self, id: &impl std::fmt::Display) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => id.to_string(),
        }
    }

    /// Returns the subscriber queue bound clamped to a minimum of 1.
    #[inline]
    pub fn subscriber_capacity_clamped(&self) -> usize {
        self.subscriber_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `overwrite = true`
    /// - `silent = Silence::Off`
    /// - `log = false`, `log_collapsed = true`, `icon = "📟"`
    /// - `cancel_grace = None`
    /// - `subscriber_capacity = 1024`
    fn default() -> Self {
        Self {
            name: None,
            overwrite: true,
            silent: Silence::Off,
            log: false,
            log_collapsed: true,
            icon: "📟".to_string(),
            cancel_grace: None,
            subscriber_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_policy() {
        assert!(!Silence::Off.suppresses(Severity::Error));
        assert!(!Silence::Off.suppresses(Severity::Critical));
        assert!(Silence::NonCritical.suppresses(Severity::Error));
        assert!(!Silence::NonCritical.suppresses(Severity::Critical));
        assert!(Silence::All.suppresses(Severity::Critical));
        assert_eq!(Silence::from(true), Silence::NonCritical);
        assert_eq!(Silence::from(false), Silence::Off);
    }

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert!(cfg.overwrite);
        assert!(!cfg.log);
        assert!(cfg.log_collapsed);
        assert_eq!(cfg.cancel_grace, None);
        assert_eq!(cfg.display_name(&"sup-1"), "sup-1");
        let named = Config {
            name: Some("uploads".into()),
            subscriber_capacity: 0,
            ..Config::default()
        };
        assert_eq!(named.display_name(&"sup-1"), "uploads");
        assert_eq!(named.subscriber_capacity_clamped(), 1);
    }
}
