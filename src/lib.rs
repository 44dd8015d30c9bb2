//! # catvisor
//!
//! **Catvisor** is a categorized task supervisor for Tokio.
//!
//! It lets a caller launch named units of async work keyed by
//! `(category, task)`, replace or reject work under an occupied key, cancel a
//! task, a category or everything, await completion at task, category and
//! supervisor level, and shut supervisors down in a deterministic order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!       create(c, t, body)       cancel(c[, t])        subscribe(event)       kill()
//!              │                       │                      │                  │
//!              ▼                       ▼                      ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                                       │
//! │  ┌───────────────────────── Mutex<State> ──────────────────────────┐              │
//! │  │ Registry   category ─► task ─► TaskHandle                      │  root token  │
//! │  │ Dispatcher onTaskComplete / onCategoryComplete /                │  (children   │
//! │  │            onAllComplete / onManagerKilled descriptors          │   per task)  │
//! │  └─────────────────────────────────────────────────────────────────┘              │
//! │  SubscriberSet ──► LogWriter / custom Subscribe impls (LogRecord)                 │
//! └──────┬───────────────────────────┬────────────────────────────────────────────────┘
//!        ▼                           ▼
//!   runner (per task)          watcher (per task)                 kill watcher (one)
//!   gate ─► body ─► finish     gate ─► await done ─► cleanup      await killed ─► cancel_all
//!           emit onTaskComplete          rollup: category, all
//! ```
//!
//! ### Lifecycle
//! ```text
//! Pending ──(ready gate)──► Running ──┬──► Completed   (body returned)
//!    │                                ├──► Failed      (body error or panic)
//!    └──(cancelled before start)──────┴──► Cancelled   (token honored, or grace expired)
//!
//! terminal ─► onTaskComplete ─► cleanup removes the entry ─► category drained? ─► onCategoryComplete
//!                                                         └─► nothing left?    ─► onAllComplete
//! ```
//!
//! ## Features
//! | Area              | Description                                                          | Key types / traits                                  |
//! |-------------------|----------------------------------------------------------------------|-----------------------------------------------------|
//! | **Supervision**   | Create, replace, cancel and kill categorized tasks.                  | [`Supervisor`], [`SupervisorBuilder`], [`KillHandle`] |
//! | **Directory**     | One live supervisor per manager id; ordered shutdown of all of them. | [`Directory`]                                       |
//! | **Events**        | Await task, category, all-complete and kill signals.                 | [`Event`], [`EventKind`], [`Notification`], [`Subscription`] |
//! | **Tasks**         | Bodies as closures or trait objects, typed results.                  | [`Task`], [`TaskFn`], [`TaskRef`], [`TaskReport`]   |
//! | **Errors**        | Typed errors for orchestration and task bodies.                      | [`ManagerError`], [`TaskError`]                     |
//! | **Logging**       | Lifecycle records fanned out to subscribers.                         | [`LogRecord`], [`Subscribe`], [`SubscriberSet`]     |
//! | **Configuration** | Overwrite and silent policies, logging, cancel grace.                | [`Config`], [`Silence`]                             |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`], which renders records through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use catvisor::{Config, Directory, Event, TaskError, TaskFn, TaskRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory = Directory::new();
//!     let sup = directory.create_or_replace("uploads", Config::default());
//!
//!     let upload: TaskRef = TaskFn::arc(|ctx: CancellationToken| async move {
//!         tokio::select! {
//!             _ = ctx.cancelled() => Err(TaskError::Canceled),
//!             _ = tokio::time::sleep(Duration::from_millis(10)) => Ok("uploaded"),
//!         }
//!     });
//!
//!     sup.create("photos", "p-1", upload).await?;
//!     let done = sup.subscribe(Event::task_complete("photos", "p-1"))?;
//!
//!     let note = done.await?;
//!     let report = note.report().expect("task report");
//!     assert_eq!(report.value::<&str>(), Some(&"uploaded"));
//!
//!     directory.kill_all(true).await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod key;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{Config, Directory, KillHandle, Silence, Supervisor, SupervisorBuilder};
pub use error::{ManagerError, Severity, TaskError};
pub use events::{CategorySnapshot, Event, EventKind, LogRecord, Notification, Settled, Subscription};
pub use key::Key;
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    BoxTaskFuture, Task, TaskFn, TaskHandle, TaskRef, TaskReport, TaskResult, TaskStatus, TaskValue,
};

// Optional: built-in subscriber rendering records through `tracing`.
// Enabled by default: `--no-default-features` removes it.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
