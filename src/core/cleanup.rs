//! # Cleanup and kill watchers.
//!
//! Two small background loops that react to dispatcher events:
//!
//! - [`watch_task`]: one per task. Opens the runner's ready gate, waits for
//!   `onTaskComplete`, removes the registry entry (identity-guarded), rolls
//!   up category/all completion and retires the handle.
//! - [`watch_kill`]: one per supervisor, started with the first task. Waits
//!   for `onManagerKilled` and runs `cancel_all` once.
//!
//! The kill watcher only holds a `Weak` reference, so a dropped supervisor
//! ends it (its pending descriptor rejects with `Dropped`).

use std::sync::{Arc, Weak};

use tokio::sync::oneshot;

use crate::core::Supervisor;
use crate::core::registry::Removal;
use crate::events::{Notification, Subscription};
use crate::tasks::TaskHandle;

/// Waits for `handle` to complete, then removes it from the registry.
pub(crate) async fn watch_task(
    sup: Arc<Supervisor>,
    handle: Arc<TaskHandle>,
    done: Subscription,
    ready: oneshot::Sender<()>,
) {
    let _ = ready.send(());

    let report = match done.await {
        Ok(Notification::TaskComplete(report)) => Some(report),
        Ok(_) | Err(_) => handle.report(),
    };

    if sup.cleanup(&handle) == Removal::Stale {
        tracing::debug!(
            category = %handle.category(),
            task = %handle.task(),
            "entry already taken over by a newer task"
        );
    }
    if let Some(report) = report {
        sup.log_task_complete(&report);
    }
    handle.retire();
}

/// Waits for the kill signal and cancels everything still registered.
pub(crate) async fn watch_kill(sup: Weak<Supervisor>, killed: Subscription) {
    if killed.await.is_err() {
        return;
    }
    let Some(sup) = sup.upgrade() else {
        return;
    };
    sup.cancel_all().await;
}
