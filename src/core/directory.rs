//! # Directory: one live supervisor per manager id.
//!
//! A [`Directory`] is an explicitly constructed, cheaply cloneable table of
//! supervisors. Creating a supervisor under an id that is already tracked
//! kills the previous one (fire-and-forget) and takes its place.
//!
//! ```text
//! create_or_replace("m")      kill_all(reverse = true)
//!   ├─ build new (serial n)      ├─ drain table
//!   ├─ swap under lock           ├─ order newest → oldest
//!   └─ old.kill() (not awaited)  ├─ kill() each, in order
//!                                └─ join all, first error in kill order
//! ```
//!
//! A killed supervisor removes itself from its directory right away; the
//! entry is matched by serial so a replacement is never removed by its
//! predecessor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;

use crate::core::builder::SupervisorBuilder;
use crate::core::config::Config;
use crate::core::supervisor::Supervisor;
use crate::error::ManagerError;
use crate::key::Key;

/// Shared state behind [`Directory`].
#[derive(Default)]
pub(crate) struct DirectoryInner {
    entries: Mutex<Vec<Arc<Supervisor>>>,
    serial: AtomicU64,
}

impl DirectoryInner {
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Supervisor>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes and returns the live entry for `id`.
    fn take(&self, id: &Key) -> Option<Arc<Supervisor>> {
        take_entry(&mut self.lock(), id)
    }

    /// Drops the entry for `id` if it is still the one created under `serial`.
    pub(crate) fn forget(&self, id: &Key, serial: u64) {
        self.lock()
            .retain(|sup| !(sup.id() == id && sup.serial() == serial));
    }
}

fn take_entry(entries: &mut Vec<Arc<Supervisor>>, id: &Key) -> Option<Arc<Supervisor>> {
    let idx = entries.iter().position(|s| s.id() == id)?;
    Some(entries.remove(idx))
}

/// Table of live supervisors keyed by manager id.
#[derive(Clone, Default)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
}

impl Directory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a supervisor for `id` with `cfg`, replacing any live one.
    pub fn create_or_replace(&self, id: impl Into<Key>, cfg: Config) -> Arc<Supervisor> {
        self.create_or_replace_with(SupervisorBuilder::new(id).with_config(cfg))
    }

    /// Same as [`create_or_replace`](Self::create_or_replace) for a prepared builder.
    ///
    /// The predecessor is killed before the new supervisor is built.
    pub fn create_or_replace_with(&self, builder: SupervisorBuilder) -> Arc<Supervisor> {
        if let Some(previous) = self.inner.take(builder.id()) {
            tracing::debug!(manager = %previous.id(), "replacing live supervisor");
            // Teardown proceeds on its own; nobody waits for the drain.
            drop(previous.kill());
        }

        let serial = self.inner.serial.fetch_add(1, Ordering::Relaxed) + 1;
        let sup = builder.build_in(Arc::downgrade(&self.inner), serial);

        // A concurrent replace may have registered the same id meanwhile.
        let raced = {
            let mut entries = self.inner.lock();
            let raced = take_entry(&mut entries, sup.id());
            entries.push(Arc::clone(&sup));
            raced
        };
        if let Some(raced) = raced {
            drop(raced.kill());
        }
        sup
    }

    /// Live supervisor registered under `id`.
    pub fn get(&self, id: impl Into<Key>) -> Option<Arc<Supervisor>> {
        let id = id.into();
        self.inner.lock().iter().find(|s| *s.id() == id).cloned()
    }

    /// Ids of the live supervisors, in creation order.
    pub fn ids(&self) -> Vec<Key> {
        self.inner.lock().iter().map(|s| s.id().clone()).collect()
    }

    /// Number of live supervisors.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// `true` when no supervisor is tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Kills every tracked supervisor and waits for all of them to drain.
    ///
    /// `reverse = true` kills newest first, `false` in creation order. All
    /// kills are awaited; the first error in kill order is returned.
    pub async fn kill_all(&self, reverse: bool) -> Result<(), ManagerError> {
        let mut entries = std::mem::take(&mut *self.inner.lock());
        entries.sort_by_key(|s| s.serial());
        if reverse {
            entries.reverse();
        }

        let kills: Vec<_> = entries.iter().map(|s| s.kill()).collect();
        join_all(kills).await.into_iter().collect()
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory").field("ids", &self.ids()).finish()
    }
}
