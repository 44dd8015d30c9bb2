use std::sync::{Arc, Weak};

use crate::core::config::Config;
use crate::core::directory::DirectoryInner;
use crate::core::supervisor::Supervisor;
use crate::key::Key;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`Supervisor`].
pub struct SupervisorBuilder {
    id: Key,
    cfg: Config,
    subscribers: Option<Vec<Arc<dyn Subscribe>>>,
}

impl SupervisorBuilder {
    /// Creates a builder for manager `id` with the default [`Config`].
    pub fn new(id: impl Into<Key>) -> Self {
        Self {
            id: id.into(),
            cfg: Config::default(),
            subscribers: None,
        }
    }

    /// Manager id this builder was created for.
    pub fn id(&self) -> &Key {
        &self.id
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the record subscribers.
    ///
    /// Without this call, a supervisor with [`Config::log`] enabled gets the
    /// built-in `LogWriter` (feature `logging`). Records are produced only when
    /// `log` is on, whatever the subscribers are.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = Some(subscribers);
        self
    }

    /// Builds a standalone supervisor.
    ///
    /// Must be called inside a Tokio runtime when there are subscribers
    /// (their workers are spawned here).
    pub fn build(self) -> Arc<Supervisor> {
        self.build_in(Weak::new(), 0)
    }

    /// Builds a supervisor tracked by a directory under `serial`.
    pub(crate) fn build_in(self, directory: Weak<DirectoryInner>, serial: u64) -> Arc<Supervisor> {
        let subscribers = match self.subscribers {
            Some(subs) => subs,
            None => default_subscribers(&self.cfg),
        };
        let subs = SubscriberSet::new(subscribers, self.cfg.subscriber_capacity_clamped());

        let sup = Arc::new(Supervisor::new_internal(
            self.id, self.cfg, subs, directory, serial,
        ));
        sup.log_constructed();
        sup
    }
}

#[cfg(feature = "logging")]
fn default_subscribers(cfg: &Config) -> Vec<Arc<dyn Subscribe>> {
    if cfg.log {
        vec![Arc::new(crate::subscribers::LogWriter::new())]
    } else {
        Vec::new()
    }
}

#[cfg(not(feature = "logging"))]
fn default_subscribers(_cfg: &Config) -> Vec<Arc<dyn Subscribe>> {
    Vec::new()
}
