//! # Run one task body to its terminal state.
//!
//! ```text
//! ready gate ──► token cancelled? ── yes ─────────────────────────► Cancelled(None)
//!                     │ no
//!                     ▼
//!               set Running ──► body.spawn(child token) ──► catch_unwind
//!                                    │
//!                                    ├─ Ok(v), token live      ─► Completed(Value v)
//!                                    ├─ Ok(v), token cancelled ─► Cancelled(Value v)
//!                                    ├─ Err(Canceled)          ─► Cancelled(None)
//!                                    ├─ Err(e) / panic         ─► Failed(Error e)
//!                                    └─ grace expired          ─► Cancelled(None), body dropped
//! ```
//!
//! ## Rules
//! - The body never starts before the creator opened the ready gate.
//! - Body errors and panics stop here: they become the terminal result.
//! - `Supervisor::finish` is called **exactly once** per handle, and emits `onTaskComplete`.
//! - The grace bound only applies once cancellation was requested.
//! - Status follows the token, not the body: once cancellation was requested, a
//!   body that returns `Ok(v)` is `Cancelled(Value v)` whether or not it ever
//!   looked at its token.
//! - A token cancelled before the gate opens means the body is never spawned.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::Supervisor;
use crate::error::TaskError;
use crate::subscribers::panic_message;
use crate::tasks::{TaskHandle, TaskResult, TaskStatus, TaskValue};

/// How the body stopped, before classification.
#[derive(Debug)]
enum Outcome {
    /// The token was cancelled before the gate opened; the body never ran.
    Skipped,
    /// The body returned.
    Returned(Result<TaskValue, TaskError>),
    /// The body panicked.
    Panicked(String),
    /// The body outlived the cancel grace and was dropped.
    Abandoned(Duration),
}

/// Drives `handle` from `Pending` to a terminal state.
pub(crate) async fn run_task(
    sup: Arc<Supervisor>,
    handle: Arc<TaskHandle>,
    ready: oneshot::Receiver<()>,
) {
    // A closed gate means the watcher is gone; the task still has to terminate.
    let _ = ready.await;

    let token = handle.token().clone();
    let outcome = if token.is_cancelled() {
        Outcome::Skipped
    } else {
        handle.set_running();
        execute(&handle, &token, sup.config().cancel_grace).await
    };

    if let Outcome::Abandoned(grace) = &outcome {
        sup.log_warn_abandoned(&handle, *grace);
    }

    let (status, result) = classify(outcome, token.is_cancelled());
    sup.finish(&handle, status, result);
}

async fn execute(
    handle: &TaskHandle,
    token: &CancellationToken,
    grace: Option<Duration>,
) -> Outcome {
    let spawned =
        std::panic::catch_unwind(AssertUnwindSafe(|| handle.body().spawn(token.clone())));
    let fut = match spawned {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind(),
        Err(panic) => return Outcome::Panicked(panic_message(&*panic)),
    };

    let res = match grace {
        None => fut.await,
        Some(grace) => {
            tokio::pin!(fut);
            tokio::select! {
                biased;
                res = &mut fut => res,
                _ = expire(token, grace) => return Outcome::Abandoned(grace),
            }
        }
    };

    match res {
        Ok(ret) => Outcome::Returned(ret),
        Err(panic) => Outcome::Panicked(panic_message(&*panic)),
    }
}

/// Resolves `grace` after cancellation was requested.
async fn expire(token: &CancellationToken, grace: Duration) {
    token.cancelled().await;
    tokio::time::sleep(grace).await;
}

fn classify(outcome: Outcome, cancelled: bool) -> (TaskStatus, TaskResult) {
    match outcome {
        Outcome::Skipped | Outcome::Abandoned(_) => (TaskStatus::Cancelled, TaskResult::None),
        Outcome::Returned(Ok(value)) if cancelled => {
            (TaskStatus::Cancelled, TaskResult::Value(value))
        }
        Outcome::Returned(Ok(value)) => (TaskStatus::Completed, TaskResult::Value(value)),
        Outcome::Returned(Err(TaskError::Canceled)) => (TaskStatus::Cancelled, TaskResult::None),
        Outcome::Returned(Err(err)) => (TaskStatus::Failed, TaskResult::Error(Arc::new(err))),
        Outcome::Panicked(info) => (
            TaskStatus::Failed,
            TaskResult::Error(Arc::new(TaskError::Panicked { info })),
        ),
    }
}
