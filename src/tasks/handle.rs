//! # Handle to one in-flight task.
//!
//! A [`TaskHandle`] is created by [`Supervisor::create`](crate::Supervisor::create)
//! and owned by the registry entry for its `(category, task)` key. The runner and
//! the cleanup watcher hold clones of the `Arc`, but only the registry decides
//! whether the handle is the live occupant of its key: handles are compared by
//! identity, so a stale handle can never evict its replacement.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::key::Key;
use crate::tasks::report::{TaskReport, TaskStatus};
use crate::tasks::task::TaskRef;

/// Handle to a task registered in a supervisor.
pub struct TaskHandle {
    category: Key,
    task: Key,
    body: TaskRef,
    token: CancellationToken,
    created: Instant,
    status: watch::Sender<TaskStatus>,
    report: OnceLock<Arc<TaskReport>>,
    retired: CancellationToken,
}

impl TaskHandle {
    pub(crate) fn new(category: Key, task: Key, body: TaskRef, token: CancellationToken) -> Self {
        let (status, _rx) = watch::channel(TaskStatus::Pending);
        Self {
            category,
            task,
            body,
            token,
            created: Instant::now(),
            status,
            report: OnceLock::new(),
            retired: CancellationToken::new(),
        }
    }

    /// Category id.
    pub fn category(&self) -> &Key {
        &self.category
    }

    /// Task id.
    pub fn task(&self) -> &Key {
        &self.task
    }

    /// The caller-supplied body.
    pub fn body(&self) -> &TaskRef {
        &self.body
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> Instant {
        self.created
    }

    /// Time since creation.
    pub fn elapsed(&self) -> Duration {
        self.created.elapsed()
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status transition.
    pub fn watch_status(&self) -> watch::Receiver<TaskStatus> {
        self.status.subscribe()
    }

    /// `true` until the task reaches a terminal state (pending tasks count as running).
    pub fn is_running(&self) -> bool {
        !self.status().is_terminal()
    }

    /// Terminal report, once available.
    pub fn report(&self) -> Option<Arc<TaskReport>> {
        self.report.get().cloned()
    }

    /// Asks the body to stop. Idempotent; does not wait.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits until the handle has been removed from the registry.
    ///
    /// Resolves after the terminal report is recorded and cleanup ran.
    pub async fn retired(&self) {
        self.retired.cancelled().await
    }

    /// `true` once the handle has been removed from the registry.
    pub fn is_retired(&self) -> bool {
        self.retired.is_cancelled()
    }

    pub(crate) fn retire(&self) {
        self.retired.cancel();
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn set_running(&self) {
        self.status.send_replace(TaskStatus::Running);
    }

    /// Records the terminal report. Returns `false` if one was already recorded.
    pub(crate) fn finish(&self, report: Arc<TaskReport>) -> bool {
        let status = report.status;
        if self.report.set(report).is_err() {
            return false;
        }
        self.status.send_replace(status);
        true
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("category", &self.category)
            .field("task", &self.task)
            .field("status", &self.status())
            .finish()
    }
}
