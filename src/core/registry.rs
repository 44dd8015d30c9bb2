//! # Task registry: category → task id → handle.
//!
//! The registry is the source of truth for "what is running". It is a plain
//! data structure; the supervisor owns it behind its coordinator lock, so every
//! structural mutation below happens atomically with the matching dispatcher
//! bookkeeping.
//!
//! ## Rules
//! - A category entry exists **iff** it holds at least one task; the last removal deletes it.
//! - At most one handle per `(category, task)`; `save` refuses an occupied key.
//! - `remove` compares handles by identity, so a finished task whose key was
//!   already taken over by its replacement can never evict the replacement.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ManagerError;
use crate::events::CategorySnapshot;
use crate::key::Key;
use crate::tasks::TaskHandle;

/// Outcome of [`Registry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// Nothing stored under the key.
    Missing,
    /// A different handle occupies the key; left untouched.
    Stale,
    /// Removed; `drained` is `true` when the category entry was deleted as well.
    Removed { drained: bool },
}

/// Two-level map of registered tasks.
#[derive(Default)]
pub struct Registry {
    categories: HashMap<Key, HashMap<Key, Arc<TaskHandle>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, category: &Key, task: &Key) -> Option<Arc<TaskHandle>> {
        self.categories.get(category)?.get(task).cloned()
    }

    /// Every handle in `category` (empty if the category does not exist).
    pub(crate) fn get_all(&self, category: &Key) -> Vec<Arc<TaskHandle>> {
        self.categories
            .get(category)
            .map(|tasks| tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// `exists(c, None)` checks the category, `exists(c, Some(t))` the task.
    pub(crate) fn exists(&self, category: &Key, task: Option<&Key>) -> bool {
        match (self.categories.get(category), task) {
            (Some(tasks), Some(task)) => tasks.contains_key(task),
            (Some(tasks), None) => !tasks.is_empty(),
            (None, _) => false,
        }
    }

    /// Stores `handle` under `(category, task)`.
    ///
    /// Fails with [`ManagerError::DuplicateTask`] if the key is occupied; callers
    /// replacing a finished occupant must `remove` it first.
    pub(crate) fn save(
        &mut self,
        category: &Key,
        task: &Key,
        handle: Arc<TaskHandle>,
    ) -> Result<(), ManagerError> {
        let tasks = self.categories.entry(category.clone()).or_default();
        if tasks.contains_key(task) {
            return Err(ManagerError::DuplicateTask {
                category: category.clone(),
                task: task.clone(),
            });
        }
        tasks.insert(task.clone(), handle);
        Ok(())
    }

    /// Removes `(category, task)` if it still holds exactly `handle`.
    pub(crate) fn remove(&mut self, category: &Key, task: &Key, handle: &Arc<TaskHandle>) -> Removal {
        let Some(tasks) = self.categories.get_mut(category) else {
            return Removal::Missing;
        };
        match tasks.get(task) {
            None => return Removal::Missing,
            Some(stored) if !Arc::ptr_eq(stored, handle) => return Removal::Stale,
            Some(_) => {}
        }
        tasks.remove(task);
        let drained = tasks.is_empty();
        if drained {
            self.categories.remove(category);
        }
        Removal::Removed { drained }
    }

    /// Snapshot of category keys, safe to iterate while the registry changes.
    pub(crate) fn categories(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.categories.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Every registered handle.
    pub(crate) fn handles(&self) -> Vec<Arc<TaskHandle>> {
        self.categories
            .values()
            .flat_map(|tasks| tasks.values().cloned())
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Total number of registered tasks.
    pub(crate) fn len(&self) -> usize {
        self.categories.values().map(HashMap::len).sum()
    }

    /// Sorted listing of categories and their task ids, for log records.
    pub(crate) fn snapshot(&self) -> Vec<CategorySnapshot> {
        self.categories()
            .into_iter()
            .map(|category| {
                let mut tasks: Vec<Key> = self
                    .categories
                    .get(&category)
                    .map(|t| t.keys().cloned().collect())
                    .unwrap_or_default();
                tasks.sort_unstable();
                CategorySnapshot { category, tasks }
            })
            .collect()
    }
}
