//! # Completion-event dispatcher.
//!
//! Keeps one [`Deferred`] per subscribed event key and rolls lower-level
//! completions up into higher-level ones.
//!
//! ## Index layout
//! ```text
//! tasks:      category ─► task ─► Deferred      (onTaskComplete)
//! categories: category ─► Deferred              (onCategoryComplete)
//! all:        Option<Deferred>                  (onAllComplete)
//! killed:     Option<Deferred>                  (onManagerKilled)
//! ```
//!
//! ## Rules
//! - Descriptors are created lazily by `subscribe` and shared by every subscriber of the same key.
//! - `emit`/`reject` remove the descriptor **before** settling it; a later `subscribe` creates a fresh one.
//! - Rollup runs after the removal:
//!   - `onCategoryComplete[c]` resolves once `c` is gone from the registry;
//!   - `onAllComplete` resolves once no task/category descriptor is pending and the registry is empty.
//! - Existence checks happen at subscribe time only; by emit time the task may be gone.
//!
//! The dispatcher is not synchronized on its own: the supervisor keeps it next to
//! the [`Registry`] behind one lock so every mutation of both is atomic.

use std::collections::HashMap;

use crate::core::Registry;
use crate::error::ManagerError;
use crate::events::deferred::{Deferred, Settled, Subscription};
use crate::events::event::{Event, EventKind, Notification};
use crate::key::Key;

/// Index of pending event descriptors.
#[derive(Default)]
pub(crate) struct Dispatcher {
    tasks: HashMap<Key, HashMap<Key, Deferred>>,
    categories: HashMap<Key, Deferred>,
    all: Option<Deferred>,
    killed: Option<Deferred>,
    /// Payload of the kill signal once emitted; late subscribers get it settled.
    kill_note: Option<Notification>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the (possibly shared) subscription for `event`.
    ///
    /// - `TaskComplete`: the task must be registered. A task that already reached a
    ///   terminal state but is not cleaned up yet yields a settled subscription with its report.
    /// - `CategoryComplete`: the category must be registered.
    /// - `AllComplete`: resolves right away when nothing is registered or pending.
    /// - `ManagerKilled`: settled with the original payload once the kill was emitted.
    pub(crate) fn subscribe(
        &mut self,
        event: &Event,
        registry: &Registry,
    ) -> Result<Subscription, ManagerError> {
        match event {
            Event::TaskComplete { category, task } => {
                let handle = registry.get(category, task).ok_or_else(|| ManagerError::NotFound {
                    event: EventKind::TaskComplete.as_str(),
                    target: format!("{category}.{task}"),
                })?;
                if let Some(report) = handle.report() {
                    return Ok(Subscription::settled(Ok(Notification::TaskComplete(report))));
                }
                let deferred = self
                    .tasks
                    .entry(category.clone())
                    .or_default()
                    .entry(task.clone())
                    .or_insert_with(|| Deferred::new(EventKind::TaskComplete.as_str()));
                Ok(deferred.subscribe())
            }
            Event::CategoryComplete { category } => {
                if !registry.exists(category, None) {
                    return Err(ManagerError::NotFound {
                        event: EventKind::CategoryComplete.as_str(),
                        target: category.to_string(),
                    });
                }
                let deferred = self
                    .categories
                    .entry(category.clone())
                    .or_insert_with(|| Deferred::new(EventKind::CategoryComplete.as_str()));
                Ok(deferred.subscribe())
            }
            Event::AllComplete => {
                let sub = self
                    .all
                    .get_or_insert_with(|| Deferred::new(EventKind::AllComplete.as_str()))
                    .subscribe();
                self.rollup(None, registry);
                Ok(sub)
            }
            Event::ManagerKilled => {
                if let Some(note) = &self.kill_note {
                    return Ok(Subscription::settled(Ok(note.clone())));
                }
                Ok(self
                    .killed
                    .get_or_insert_with(|| Deferred::new(EventKind::ManagerKilled.as_str()))
                    .subscribe())
            }
        }
    }

    /// Resolves the descriptor for `event` (if any) and rolls up.
    ///
    /// Returns `true` if a pending descriptor was resolved.
    pub(crate) fn emit(&mut self, event: &Event, payload: Notification, registry: &Registry) -> bool {
        self.settle(event, Ok(payload), registry)
    }

    /// Rejects the descriptor for `event` (if any) and rolls up.
    ///
    /// Returns `true` if a pending descriptor was rejected. Supervisors only
    /// resolve; a descriptor they abandon rejects with `Dropped` on its own.
    #[allow(dead_code)]
    pub(crate) fn reject(&mut self, event: &Event, err: ManagerError, registry: &Registry) -> bool {
        self.settle(event, Err(err), registry)
    }

    /// Resolves aggregate descriptors whose condition now holds.
    ///
    /// `category` is the category whose state just changed, if any.
    pub(crate) fn rollup(&mut self, category: Option<&Key>, registry: &Registry) {
        if let Some(category) = category {
            if !registry.exists(category, None) {
                if let Some(mut deferred) = self.categories.remove(category) {
                    deferred.resolve(Notification::CategoryComplete {
                        category: category.clone(),
                    });
                }
            }
        }

        if self.all.is_some() && self.is_idle() && registry.is_empty() {
            if let Some(mut deferred) = self.all.take() {
                deferred.resolve(Notification::AllComplete);
            }
        }
    }

    /// `true` when no per-task or per-category descriptor is pending.
    pub(crate) fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.categories.is_empty()
    }

    /// Number of pending descriptors across all families.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.tasks.values().map(HashMap::len).sum::<usize>()
            + self.categories.len()
            + usize::from(self.all.is_some())
            + usize::from(self.killed.is_some())
    }

    fn settle(&mut self, event: &Event, outcome: Settled, registry: &Registry) -> bool {
        if let (Event::ManagerKilled, Ok(payload)) = (event, &outcome) {
            self.kill_note.get_or_insert_with(|| payload.clone());
        }
        let settled = match self.take(event) {
            Some(mut deferred) => {
                debug_assert!(!deferred.is_settled(), "indexed descriptors are unsettled");
                match outcome {
                    Ok(payload) => deferred.resolve(payload),
                    Err(err) => deferred.reject(err),
                }
            }
            None => false,
        };

        let category = match event {
            Event::TaskComplete { category, .. } | Event::CategoryComplete { category } => {
                Some(category)
            }
            Event::AllComplete | Event::ManagerKilled => None,
        };
        self.rollup(category, registry);
        settled
    }

    /// Removes the descriptor for `event` from the index.
    fn take(&mut self, event: &Event) -> Option<Deferred> {
        match event {
            Event::TaskComplete { category, task } => {
                let tasks = self.tasks.get_mut(category)?;
                let deferred = tasks.remove(task);
                if tasks.is_empty() {
                    self.tasks.remove(category);
                }
                deferred
            }
            Event::CategoryComplete { category } => self.categories.remove(category),
            Event::AllComplete => self.all.take(),
            Event::ManagerKilled => self.killed.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::TaskError;
    use crate::tasks::{TaskFn, TaskHandle, TaskRef, TaskReport, TaskResult, TaskStatus};

    fn handle(category: &str, task: &str) -> Arc<TaskHandle> {
        let body: TaskRef = TaskFn::arc(|_ctx: CancellationToken| async { Ok::<_, TaskError>(()) });
        Arc::new(TaskHandle::new(
            Key::from(category),
            Key::from(task),
            body,
            CancellationToken::new(),
        ))
    }

    fn report(category: &str, task: &str) -> Notification {
        Notification::TaskComplete(Arc::new(TaskReport {
            manager: Key::from("m"),
            category: Key::from(category),
            task: Key::from(task),
            status: TaskStatus::Completed,
            result: TaskResult::None,
            duration: Duration::ZERO,
        }))
    }

    #[test]
    fn subscribe_validates_targets() {
        let mut d = Dispatcher::new();
        let registry = Registry::new();
        let err = d
            .subscribe(&Event::task_complete("a", "x"), &registry)
            .expect_err("missing task");
        assert_eq!(
            err,
            ManagerError::NotFound {
                event: "onTaskComplete",
                target: "a.x".into()
            }
        );
        assert!(d.subscribe(&Event::category_complete("a"), &registry).is_err());
        assert_eq!(d.pending(), 0);
    }

    #[tokio::test]
    async fn same_key_shares_descriptor() {
        let mut d = Dispatcher::new();
        let mut registry = Registry::new();
        registry.save(&"a".into(), &"x".into(), handle("a", "x")).expect("save");

        let first = d.subscribe(&Event::task_complete("a", "x"), &registry).expect("sub");
        let second = d.subscribe(&Event::task_complete("a", "x"), &registry).expect("sub");
        assert_eq!(d.pending(), 1);

        assert!(d.emit(&Event::task_complete("a", "x"), report("a", "x"), &registry));
        assert_eq!(d.pending(), 0);
        assert!(first.await.expect("first").report().is_some());
        assert!(second.await.expect("second").report().is_some());

        // consumed: emitting again is a no-op
        assert!(!d.emit(&Event::task_complete("a", "x"), report("a", "x"), &registry));
    }

    #[tokio::test]
    async fn category_resolves_only_after_drain() {
        let mut d = Dispatcher::new();
        let mut registry = Registry::new();
        let hx = handle("a", "x");
        let hy = handle("a", "y");
        registry.save(&"a".into(), &"x".into(), Arc::clone(&hx)).expect("save");
        registry.save(&"a".into(), &"y".into(), Arc::clone(&hy)).expect("save");

        let cat = d.subscribe(&Event::category_complete("a"), &registry).expect("sub");

        registry.remove(&"a".into(), &"x".into(), &hx);
        d.rollup(Some(&"a".into()), &registry);
        assert!(cat.peek().is_none());
        assert_eq!(d.pending(), 1);

        registry.remove(&"a".into(), &"y".into(), &hy);
        d.rollup(Some(&"a".into()), &registry);
        assert!(matches!(
            cat.await,
            Ok(Notification::CategoryComplete { category }) if category == Key::from("a")
        ));
        assert_eq!(d.pending(), 0);
    }

    #[tokio::test]
    async fn all_complete_waits_for_registry_and_descriptors() {
        let mut d = Dispatcher::new();
        let mut registry = Registry::new();
        let h = handle("a", "x");
        registry.save(&"a".into(), &"x".into(), Arc::clone(&h)).expect("save");

        let task = d.subscribe(&Event::task_complete("a", "x"), &registry).expect("sub");
        let all = d.subscribe(&Event::AllComplete, &registry).expect("sub");
        assert!(all.peek().is_none());

        // task event fires while the entry is still registered: not yet
        d.emit(&Event::task_complete("a", "x"), report("a", "x"), &registry);
        assert!(task.await.is_ok());
        let pending_all = all.clone();
        tokio::task::yield_now().await;
        assert!(pending_all.peek().is_none());

        registry.remove(&"a".into(), &"x".into(), &h);
        d.rollup(Some(&"a".into()), &registry);
        assert!(matches!(all.await, Ok(Notification::AllComplete)));
    }

    #[tokio::test]
    async fn all_complete_on_empty_registry_is_immediate() {
        let mut d = Dispatcher::new();
        let registry = Registry::new();
        let all = d.subscribe(&Event::AllComplete, &registry).expect("sub");
        assert!(matches!(all.await, Ok(Notification::AllComplete)));
        assert_eq!(d.pending(), 0);
    }

    #[tokio::test]
    async fn terminal_task_yields_settled_subscription() {
        let mut d = Dispatcher::new();
        let mut registry = Registry::new();
        let h = handle("a", "x");
        registry.save(&"a".into(), &"x".into(), Arc::clone(&h)).expect("save");
        if let Notification::TaskComplete(r) = report("a", "x") {
            assert!(h.finish(r));
        }
        let sub = d.subscribe(&Event::task_complete("a", "x"), &registry).expect("sub");
        assert_eq!(d.pending(), 0);
        assert!(sub.await.expect("settled").report().is_some());
    }

    #[tokio::test]
    async fn reject_settles_with_error() {
        let mut d = Dispatcher::new();
        let registry = Registry::new();
        let killed = d.subscribe(&Event::ManagerKilled, &registry).expect("sub");
        let err = ManagerError::Rejected {
            event: "onManagerKilled",
            reason: "test".into(),
        };
        assert!(d.reject(&Event::ManagerKilled, err.clone(), &registry));
        assert_eq!(killed.await.expect_err("rejected"), err);
    }

    #[tokio::test]
    async fn late_kill_subscriber_gets_the_emitted_payload() {
        let mut d = Dispatcher::new();
        let registry = Registry::new();
        let early = d.subscribe(&Event::ManagerKilled, &registry).expect("sub");
        let note = Notification::ManagerKilled {
            manager: Key::from("m"),
            seq: 7,
        };
        assert!(d.emit(&Event::ManagerKilled, note, &registry));
        assert!(early.await.is_ok());

        let late = d.subscribe(&Event::ManagerKilled, &registry).expect("sub");
        assert!(late.peek().is_some());
        assert!(matches!(
            late.await,
            Ok(Notification::ManagerKilled { seq: 7, .. })
        ));
        assert_eq!(d.pending(), 0);
    }
}
