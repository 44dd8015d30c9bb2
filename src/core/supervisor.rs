//! # Supervisor: categorized tasks, completion events and kill sequencing.
//!
//! A [`Supervisor`] owns a registry of running tasks keyed by
//! `(category, task)`, a dispatcher of completion events, a root cancellation
//! token and an optional [`SubscriberSet`] for lifecycle records.
//!
//! ## Key responsibilities
//! - create tasks with a **replace-or-reject** policy for occupied keys
//! - cancel a task, a category, or everything, and wait for their finalization
//! - roll task completions up into category and all-complete events
//! - kill: stop accepting work, cancel everything, resolve once drained
//!
//! ## High-level architecture
//! ```text
//! create(c, t, body)
//!   │  ┌──────────────── coordinator lock ────────────────┐
//!   ├─►│ occupied & running? ─ overwrite ─► cancel + subscribe onTaskComplete ──► (unlock, await, retry)
//!   │  │                     └ reject ───► TaskAlreadyExists
//!   │  │ occupied & terminal? ─► remove stale entry
//!   │  │ save handle(child token) ─► subscribe onTaskComplete (for the watcher)
//!   │  └──────────────────────────────────────────────────┘
//!   ├─► spawn runner  ──► body ──► finish() ──► emit onTaskComplete
//!   └─► spawn watcher ──► open gate ──► await onTaskComplete ──► cleanup() ──► rollup
//!                                                                     ├─► onCategoryComplete[c]
//!                                                                     └─► onAllComplete
//! kill()
//!   ├─► active = false, leave directory
//!   ├─► subscribe onAllComplete, emit onManagerKilled{seq}
//!   └─► cancel root token ─► every child token ─► bodies finalize ─► drain ─► KillHandle resolves
//! ```
//!
//! ## Rules
//! - At most one handle per key; a replacement never starts before its predecessor terminated.
//! - Registry and dispatcher change together under one `std::sync::Mutex`; it is never held across `.await`.
//! - Body errors never leave the runner; they are the task's terminal result.
//! - `kill` is idempotent: every call returns the same [`KillHandle`].
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use catvisor::{Event, Supervisor, TaskError, TaskFn, TaskRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder("main").build();
//!
//!     let body: TaskRef = TaskFn::arc(|ctx: CancellationToken| async move {
//!         ctx.cancelled().await;
//!         Ok::<_, TaskError>("stopped")
//!     });
//!     sup.create("sync", "users", body).await?;
//!     let drained = sup.subscribe(Event::category_complete("sync"))?;
//!
//!     sup.cancel_category("sync").await?;
//!     drained.await?;
//!     assert!(!sup.category_exists("sync"));
//!
//!     sup.kill().await?;
//!     Ok(())
//! }
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::core::builder::SupervisorBuilder;
use crate::core::cleanup;
use crate::core::config::Config;
use crate::core::directory::DirectoryInner;
use crate::core::registry::{Registry, Removal};
use crate::core::runner;
use crate::error::ManagerError;
use crate::events::{Dispatcher, Event, EventKind, LogRecord, Notification, Subscription};
use crate::key::Key;
use crate::subscribers::SubscriberSet;
use crate::tasks::{TaskHandle, TaskRef, TaskReport, TaskResult, TaskStatus};

/// Process-wide kill order.
static KILL_SEQ: AtomicU64 = AtomicU64::new(0);

/// One round of the create loop.
enum Step {
    /// A running occupant was cancelled; wait for it, then retry.
    Wait(Subscription),
    /// The new handle is registered.
    Ready(Arc<TaskHandle>, Subscription),
}

/// Everything guarded by the coordinator lock.
pub(crate) struct State {
    pub(crate) registry: Registry,
    pub(crate) dispatcher: Dispatcher,
}

/// Awaitable result of [`Supervisor::kill`].
///
/// Resolves once every task of the supervisor has terminated and been cleaned
/// up. Clones share the same outcome.
#[derive(Clone)]
pub struct KillHandle {
    inner: Shared<BoxFuture<'static, Result<(), ManagerError>>>,
}

impl KillHandle {
    fn new(drained: Result<Subscription, ManagerError>) -> Self {
        let fut = async move {
            match drained {
                Ok(sub) => sub.await.map(|_| ()),
                Err(err) => Err(err),
            }
        };
        Self {
            inner: fut.boxed().shared(),
        }
    }

    /// `true` once some clone observed the drain.
    pub fn is_done(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl Future for KillHandle {
    type Output = Result<(), ManagerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for KillHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KillHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

/// Categorized task supervisor.
pub struct Supervisor {
    id: Key,
    name: String,
    cfg: Config,
    serial: u64,
    active: AtomicBool,
    state: Mutex<State>,
    root: CancellationToken,
    subs: SubscriberSet,
    kill_watcher: AtomicBool,
    killed: OnceLock<KillHandle>,
    directory: Weak<DirectoryInner>,
}

impl Supervisor {
    /// Starts building a standalone supervisor (not tracked by any [`Directory`](crate::Directory)).
    pub fn builder(id: impl Into<Key>) -> SupervisorBuilder {
        SupervisorBuilder::new(id)
    }

    pub(crate) fn new_internal(
        id: Key,
        cfg: Config,
        subs: SubscriberSet,
        directory: Weak<DirectoryInner>,
        serial: u64,
    ) -> Self {
        Self {
            name: cfg.display_name(&id),
            id,
            cfg,
            serial,
            active: AtomicBool::new(true),
            state: Mutex::new(State {
                registry: Registry::new(),
                dispatcher: Dispatcher::new(),
            }),
            root: CancellationToken::new(),
            subs,
            kill_watcher: AtomicBool::new(false),
            killed: OnceLock::new(),
            directory,
        }
    }

    /// Manager id.
    pub fn id(&self) -> &Key {
        &self.id
    }

    /// Display name (configured name or the id).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the supervisor was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// `false` once [`kill`](Self::kill) was called.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers and starts a task under `(category, task)`.
    ///
    /// If the key is held by a running task:
    /// - with `overwrite` on, that task is cancelled and **awaited** before the
    ///   new one is installed, so two bodies never run for the same key;
    /// - with `overwrite` off, fails with [`ManagerError::TaskAlreadyExists`].
    ///
    /// A key held by a task that already terminated is simply taken over.
    ///
    /// Returns `Ok(None)` when the error was swallowed by [`Config::silent`].
    /// [`ManagerError::InactiveManager`] is never swallowed.
    pub async fn create(
        self: &Arc<Self>,
        category: impl Into<Key>,
        task: impl Into<Key>,
        body: TaskRef,
    ) -> Result<Option<Arc<TaskHandle>>, ManagerError> {
        let category = category.into();
        let task = task.into();

        if !self.is_active() {
            return Err(self.inactive(&category, &task));
        }
        if category.is_empty() || task.is_empty() {
            return self.fail(ManagerError::Validation { category, task });
        }

        let event = Event::task_complete(category.clone(), task.clone());
        let (handle, done) = loop {
            let step = {
                let mut guard = self.lock();
                let state = &mut *guard;

                // Checked under the lock: `kill` flips the flag before taking it.
                if !self.is_active() {
                    drop(guard);
                    return Err(self.inactive(&category, &task));
                }

                let previous = match state.registry.get(&category, &task) {
                    Some(existing) if existing.is_running() => {
                        if !self.cfg.overwrite {
                            drop(guard);
                            return self.fail(ManagerError::TaskAlreadyExists { category, task });
                        }
                        existing.cancel();
                        Some(state.dispatcher.subscribe(&event, &state.registry))
                    }
                    Some(stale) => {
                        state.registry.remove(&category, &task, &stale);
                        None
                    }
                    None => None,
                };

                match previous {
                    Some(done) => done.map(Step::Wait),
                    None => self
                        .install(state, &category, &task, &body, &event)
                        .map(|(handle, done)| Step::Ready(handle, done)),
                }
            };

            match step {
                // Dropped only if the supervisor itself went away.
                Ok(Step::Wait(previous)) => {
                    let _ = previous.await;
                }
                Ok(Step::Ready(handle, done)) => break (handle, done),
                Err(err) => return self.fail(err),
            }
        };

        self.log(Level::INFO, format!("Task Created: {category}.{task}"), |r| {
            r.with_entry("category", &category).with_entry("id", &task)
        });
        self.start_kill_watcher();

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(runner::run_task(Arc::clone(self), Arc::clone(&handle), ready_rx));
        tokio::spawn(cleanup::watch_task(
            Arc::clone(self),
            Arc::clone(&handle),
            done,
            ready_tx,
        ));

        Ok(Some(handle))
    }

    /// Saves a fresh handle and subscribes the cleanup watcher to it.
    fn install(
        &self,
        state: &mut State,
        category: &Key,
        task: &Key,
        body: &TaskRef,
        event: &Event,
    ) -> Result<(Arc<TaskHandle>, Subscription), ManagerError> {
        let handle = Arc::new(TaskHandle::new(
            category.clone(),
            task.clone(),
            Arc::clone(body),
            self.root.child_token(),
        ));
        state.registry.save(category, task, Arc::clone(&handle))?;
        let done = state.dispatcher.subscribe(event, &state.registry)?;
        Ok((handle, done))
    }

    /// Cancels one task and waits until it has terminated and been cleaned up.
    ///
    /// Returns the task's report, or `None` if no running task holds the key.
    pub async fn cancel_task(
        &self,
        category: impl Into<Key>,
        task: impl Into<Key>,
    ) -> Result<Option<Arc<TaskReport>>, ManagerError> {
        let category = category.into();
        let task = task.into();

        let (handle, done) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let Some(handle) = state.registry.get(&category, &task) else {
                return Ok(None);
            };
            if !handle.is_running() {
                return Ok(None);
            }
            let event = Event::task_complete(category, task);
            let done = state.dispatcher.subscribe(&event, &state.registry)?;
            handle.cancel();
            (handle, done)
        };

        let notification = done.await?;
        handle.retired().await;
        Ok(notification.report().cloned())
    }

    /// Cancels every running task of `category` in parallel and waits for all of them.
    ///
    /// Returns the reports of the tasks that were cancelled. The first error
    /// (in completion order of the join) is returned if any wait failed.
    pub async fn cancel_category(
        &self,
        category: impl Into<Key>,
    ) -> Result<Vec<Arc<TaskReport>>, ManagerError> {
        let category = category.into();
        let tasks: Vec<Key> = self
            .lock()
            .registry
            .get_all(&category)
            .into_iter()
            .filter(|h| h.is_running())
            .map(|h| h.task().clone())
            .collect();

        let results = join_all(
            tasks
                .into_iter()
                .map(|task| self.cancel_task(category.clone(), task)),
        )
        .await;

        let mut reports = Vec::with_capacity(results.len());
        for res in results {
            if let Some(report) = res? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// `cancel(c, Some(t))` cancels one task, `cancel(c, None)` the whole category.
    pub async fn cancel(
        &self,
        category: impl Into<Key>,
        task: Option<Key>,
    ) -> Result<Vec<Arc<TaskReport>>, ManagerError> {
        match task {
            Some(task) => Ok(self.cancel_task(category, task).await?.into_iter().collect()),
            None => self.cancel_category(category).await,
        }
    }

    /// Cancels every category concurrently.
    ///
    /// Failures are reported per category (log record and `tracing::error!`)
    /// and do not stop the others.
    pub async fn cancel_all(&self) {
        let categories = self.lock().registry.categories();
        let results = join_all(categories.into_iter().map(|category| async move {
            let res = self.cancel_category(category.clone()).await;
            (category, res)
        }))
        .await;

        for (category, res) in results {
            if let Err(err) = res {
                tracing::error!(manager = %self.id, %category, error = %err, "failed to cancel category");
                self.log(Level::ERROR, format!("Failed to cancel category {category}"), |r| {
                    r.with_entry("error", &err).with_entry("label", err.as_label())
                });
            }
        }
    }

    /// Kills the supervisor.
    ///
    /// Synchronously: marks it inactive, removes it from its directory, emits
    /// `onManagerKilled` and cancels every task. The returned handle resolves
    /// once the registry has drained (immediately if it is empty). Calling
    /// `kill` again returns a clone of the first handle.
    pub fn kill(&self) -> KillHandle {
        self.killed.get_or_init(|| self.start_kill()).clone()
    }

    fn start_kill(&self) -> KillHandle {
        self.active.store(false, Ordering::Release);
        if let Some(directory) = self.directory.upgrade() {
            directory.forget(&self.id, self.serial);
        }

        let seq = KILL_SEQ.fetch_add(1, Ordering::Relaxed);
        let drained = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let drained = state.dispatcher.subscribe(&Event::AllComplete, &state.registry);
            state.dispatcher.emit(
                &Event::ManagerKilled,
                Notification::ManagerKilled {
                    manager: self.id.clone(),
                    seq,
                },
                &state.registry,
            );
            drained
        };
        self.root.cancel();

        self.log(Level::WARN, "Task Manager Killed", |r| r.with_entry("seq", seq));
        KillHandle::new(drained)
    }

    /// Handle registered under `(category, task)`.
    pub fn get_task(&self, category: impl Into<Key>, task: impl Into<Key>) -> Option<Arc<TaskHandle>> {
        self.lock().registry.get(&category.into(), &task.into())
    }

    /// `true` while `category` holds at least one task.
    pub fn category_exists(&self, category: impl Into<Key>) -> bool {
        self.lock().registry.exists(&category.into(), None)
    }

    /// `true` while `(category, task)` is registered.
    pub fn task_exists(&self, category: impl Into<Key>, task: impl Into<Key>) -> bool {
        self.lock().registry.exists(&category.into(), Some(&task.into()))
    }

    /// Snapshot of the registered categories, sorted.
    pub fn categories(&self) -> Vec<Key> {
        self.lock().registry.categories()
    }

    /// Snapshot of every registered handle.
    pub fn tasks(&self) -> Vec<Arc<TaskHandle>> {
        self.lock().registry.handles()
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.lock().registry.len()
    }

    /// `true` when no task is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().registry.is_empty()
    }

    /// Subscribes to `event`.
    ///
    /// Fails with [`ManagerError::NotFound`] if the task or category does not exist.
    /// Concurrent subscribers of the same event share one outcome.
    pub fn subscribe(&self, event: Event) -> Result<Subscription, ManagerError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.dispatcher.subscribe(&event, &state.registry)
    }

    /// Subscribes by event name (`onTaskComplete`, `onCategoryComplete`, ...).
    pub fn subscribe_named(
        &self,
        name: &str,
        category: Option<Key>,
        task: Option<Key>,
    ) -> Result<Subscription, ManagerError> {
        let kind: EventKind = name.parse()?;
        self.subscribe(Event::from_parts(kind, category, task)?)
    }

    /// Records the terminal state of `handle` and emits `onTaskComplete`.
    pub(crate) fn finish(&self, handle: &Arc<TaskHandle>, status: TaskStatus, result: TaskResult) {
        let report = Arc::new(TaskReport {
            manager: self.id.clone(),
            category: handle.category().clone(),
            task: handle.task().clone(),
            status,
            result,
            duration: handle.elapsed(),
        });

        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if !handle.finish(Arc::clone(&report)) {
                return;
            }
            let event = Event::task_complete(report.category.clone(), report.task.clone());
            state.dispatcher.emit(
                &event,
                Notification::TaskComplete(Arc::clone(&report)),
                &state.registry,
            );
        }

        let (category, task) = (&report.category, &report.task);
        match status {
            TaskStatus::Cancelled => {
                self.log(Level::INFO, format!("Task Cancelled: {category}.{task}"), |r| {
                    r.with_entry("category", category).with_entry("id", task)
                });
            }
            TaskStatus::Failed => {
                let error = report.result.describe();
                self.log(
                    Level::ERROR,
                    format!("uncaught error while running task {category}.{task}"),
                    |r| {
                        r.with_entry("category", category)
                            .with_entry("id", task)
                            .with_entry("severity", crate::error::Severity::Critical)
                            .with_entry("error", error)
                    },
                );
            }
            _ => {}
        }
    }

    /// Removes `handle` from the registry (identity-guarded) and rolls up.
    pub(crate) fn cleanup(&self, handle: &Arc<TaskHandle>) -> Removal {
        let mut guard = self.lock();
        let state = &mut *guard;
        let removal = state
            .registry
            .remove(handle.category(), handle.task(), handle);
        state
            .dispatcher
            .rollup(Some(handle.category()), &state.registry);
        removal
    }

    fn start_kill_watcher(self: &Arc<Self>) {
        if self.kill_watcher.swap(true, Ordering::AcqRel) {
            return;
        }
        let killed = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if !self.is_active() {
                return;
            }
            state.dispatcher.subscribe(&Event::ManagerKilled, &state.registry)
        };
        let Ok(killed) = killed else {
            return;
        };
        self.log(Level::INFO, "Starting Kill Watcher", |r| r);
        tokio::spawn(cleanup::watch_kill(Arc::downgrade(self), killed));
    }

    /// Applies the silent policy to a creation error.
    fn fail(&self, err: ManagerError) -> Result<Option<Arc<TaskHandle>>, ManagerError> {
        let suppressed = self.cfg.silent.suppresses(err.severity());
        self.log(Level::ERROR, err.to_string(), |r| {
            r.with_entry("error", err.as_label())
                .with_entry("severity", err.severity())
                .with_entry("suppressed", suppressed)
        });
        if suppressed {
            Ok(None)
        } else {
            Err(err)
        }
    }

    fn inactive(&self, category: &Key, task: &Key) -> ManagerError {
        let err = ManagerError::InactiveManager {
            manager: self.id.clone(),
            category: category.clone(),
            task: task.clone(),
        };
        self.log(Level::ERROR, err.to_string(), |r| r.with_entry("error", err.as_label()));
        err
    }

    pub(crate) fn log_constructed(&self) {
        let grace = self
            .cfg
            .cancel_grace
            .map_or_else(|| "none".to_string(), |g| format!("{g:?}"));
        self.log(Level::INFO, "Task Manager Constructed", |r| {
            r.with_entry("name", &self.name)
                .with_entry("overwrite", self.cfg.overwrite)
                .with_entry("silent", format!("{:?}", self.cfg.silent))
                .with_entry("log_collapsed", self.cfg.log_collapsed)
                .with_entry("cancel_grace", grace)
        });
    }

    pub(crate) fn log_task_complete(&self, report: &TaskReport) {
        let (category, task) = (&report.category, &report.task);
        self.log(Level::INFO, format!("Task Complete: {category}.{task}"), |r| {
            r.with_entry("category", category)
                .with_entry("id", task)
                .with_entry("status", report.status)
                .with_entry("duration", format!("{:?}", report.duration))
                .with_entry("result", report.result.describe())
        });
    }

    pub(crate) fn log_warn_abandoned(&self, handle: &TaskHandle, grace: Duration) {
        let (category, task) = (handle.category(), handle.task());
        self.log(
            Level::WARN,
            format!("Task {category}.{task} did not finish within its cancel grace"),
            |r| {
                r.with_entry("category", category)
                    .with_entry("id", task)
                    .with_entry("grace", format!("{grace:?}"))
            },
        );
    }

    /// Builds a record and hands it to the subscribers.
    ///
    /// Takes the coordinator lock for the snapshot: never call it while holding the lock.
    fn log<F>(&self, level: Level, message: impl Into<Cow<'static, str>>, fill: F)
    where
        F: FnOnce(LogRecord) -> LogRecord,
    {
        if !self.cfg.log || self.subs.is_empty() {
            return;
        }
        let mut record = LogRecord::new(level, self.id.clone(), message);
        record.name = self.name.clone();
        record.icon = self.cfg.icon.clone();
        record.collapsed = self.cfg.log_collapsed;
        record.snapshot = self.lock().registry.snapshot();
        self.subs.emit(fill(record));
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::core::config::Silence;
    use crate::error::TaskError;
    use crate::subscribers::Subscribe;
    use crate::tasks::TaskFn;

    type Journal = Arc<StdMutex<Vec<String>>>;

    const WAIT: Duration = Duration::from_secs(2);

    fn supervisor(cfg: Config) -> Arc<Supervisor> {
        Supervisor::builder("test").with_config(cfg).build()
    }

    fn push(journal: &Journal, line: &str) {
        journal.lock().expect("journal").push(line.to_string());
    }

    fn lines(journal: &Journal) -> Vec<String> {
        journal.lock().expect("journal").clone()
    }

    /// Waits for cancellation, then returns `Canceled`.
    fn idle() -> TaskRef {
        TaskFn::arc(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(TaskError::Canceled)
        })
    }

    /// Like `idle`, but spends `cleanup` before recording `line`.
    fn idle_with_cleanup(journal: &Journal, line: &'static str, cleanup: Duration) -> TaskRef {
        let journal = journal.clone();
        TaskFn::arc(move |ctx: CancellationToken| {
            let journal = journal.clone();
            async move {
                ctx.cancelled().await;
                tokio::time::sleep(cleanup).await;
                push(&journal, line);
                Err::<(), _>(TaskError::Canceled)
            }
        })
    }

    async fn wait_running(handle: &TaskHandle) {
        let mut rx = handle.watch_status();
        timeout(WAIT, rx.wait_for(|s| *s != TaskStatus::Pending))
            .await
            .expect("started")
            .expect("status channel");
    }

    async fn created(sup: &Arc<Supervisor>, c: &str, t: &str, body: TaskRef) -> Arc<TaskHandle> {
        sup.create(c, t, body)
            .await
            .expect("create")
            .expect("not silenced")
    }

    #[tokio::test]
    async fn completed_task_reports_value_and_is_removed() {
        let sup = supervisor(Config::default());
        let body: TaskRef = TaskFn::arc(|_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, TaskError>(42u32)
        });
        let handle = created(&sup, "math", "answer", body).await;
        assert!(sup.task_exists("math", "answer"));
        let done = sup
            .subscribe(Event::task_complete("math", "answer"))
            .expect("subscribe");

        let note = timeout(WAIT, done).await.expect("in time").expect("complete");
        let report = note.report().expect("report");
        assert_eq!(report.status, TaskStatus::Completed);
        assert_eq!(report.value::<u32>(), Some(&42));
        assert_eq!(report.manager, Key::from("test"));

        timeout(WAIT, handle.retired()).await.expect("retired");
        assert!(!sup.task_exists("math", "answer"));
        assert!(!sup.category_exists("math"));
        assert!(sup.categories().is_empty());
    }

    #[tokio::test]
    async fn overwrite_waits_for_previous_cleanup() {
        let sup = supervisor(Config::default());
        let journal = Journal::default();

        let first = created(
            &sup,
            "sync",
            "users",
            idle_with_cleanup(&journal, "first:cleanup", Duration::from_millis(20)),
        )
        .await;
        wait_running(&first).await;

        let j = journal.clone();
        let second_body: TaskRef = TaskFn::arc(move |_ctx: CancellationToken| {
            let j = j.clone();
            async move {
                push(&j, "second:start");
                Ok::<_, TaskError>(())
            }
        });
        let second = created(&sup, "sync", "users", second_body).await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.status(), TaskStatus::Cancelled);

        timeout(WAIT, second.retired()).await.expect("second done");
        assert_eq!(lines(&journal), vec!["first:cleanup", "second:start"]);
    }

    #[tokio::test]
    async fn reject_when_overwrite_disabled() {
        let sup = supervisor(Config {
            overwrite: false,
            ..Config::default()
        });
        created(&sup, "c", "t", idle()).await;

        let err = sup.create("c", "t", idle()).await.expect_err("occupied");
        assert_eq!(err.as_label(), "manager_task_already_exists");
        assert_eq!(sup.len(), 1);
    }

    #[tokio::test]
    async fn silent_swallows_conflicts_but_not_validation() {
        let sup = supervisor(Config {
            overwrite: false,
            silent: Silence::from(true),
            ..Config::default()
        });
        created(&sup, "c", "t", idle()).await;

        assert!(sup.create("c", "t", idle()).await.expect("silenced").is_none());
        let err = sup.create("", "t", idle()).await.expect_err("critical");
        assert_eq!(err.as_label(), "manager_validation");

        let all = supervisor(Config {
            silent: Silence::All,
            ..Config::default()
        });
        assert!(all.create("c", "", idle()).await.expect("silenced").is_none());
    }

    #[tokio::test]
    async fn finished_occupant_is_taken_over_without_overwrite() {
        let sup = supervisor(Config {
            overwrite: false,
            ..Config::default()
        });
        let quick: TaskRef = TaskFn::arc(|_ctx: CancellationToken| async { Ok::<_, TaskError>(()) });
        created(&sup, "c", "t", quick).await;
        let done = sup.subscribe(Event::task_complete("c", "t")).expect("subscribe");
        timeout(WAIT, done).await.expect("in time").expect("complete");

        // the entry may still be registered here; it is terminal, so it gets replaced
        let next = created(&sup, "c", "t", idle()).await;
        tokio::task::yield_now().await;
        assert!(sup.task_exists("c", "t"));
        assert!(Arc::ptr_eq(&sup.get_task("c", "t").expect("live"), &next));
    }

    #[tokio::test]
    async fn killed_supervisor_refuses_work() {
        let sup = supervisor(Config {
            silent: Silence::All,
            ..Config::default()
        });
        sup.kill().await.expect("killed");
        let err = sup.create("c", "t", idle()).await.expect_err("inactive");
        assert_eq!(err.as_label(), "manager_inactive");
        assert!(!sup.is_active());
    }

    #[tokio::test]
    async fn kill_without_tasks_is_immediate() {
        let sup = supervisor(Config::default());
        timeout(Duration::from_millis(100), sup.kill())
            .await
            .expect("immediate")
            .expect("killed");
    }

    #[tokio::test]
    async fn kill_drains_every_task_once() {
        let sup = supervisor(Config::default());
        let journal = Journal::default();
        let mut handles = Vec::new();
        for (c, t) in [("a", "1"), ("a", "2"), ("b", "1")] {
            let h = created(
                &sup,
                c,
                t,
                idle_with_cleanup(&journal, "cleanup", Duration::from_millis(10)),
            )
            .await;
            wait_running(&h).await;
            handles.push(h);
        }

        let first = sup.kill();
        let second = sup.kill();
        assert!(!first.is_done());

        timeout(WAIT, first).await.expect("drained").expect("killed");
        timeout(WAIT, second).await.expect("drained").expect("killed");

        assert_eq!(lines(&journal).len(), 3);
        assert!(sup.is_empty());
        assert!(handles.iter().all(|h| h.status() == TaskStatus::Cancelled));
    }

    #[tokio::test]
    async fn category_completes_when_last_task_leaves() {
        let sup = supervisor(Config::default());
        created(&sup, "A", "x", idle()).await;
        created(&sup, "A", "y", idle()).await;
        let drained = sup
            .subscribe(Event::category_complete("A"))
            .expect("subscribe");

        let report = sup.cancel_task("A", "x").await.expect("cancel").expect("running");
        assert_eq!(report.status, TaskStatus::Cancelled);
        assert!(timeout(Duration::from_millis(20), drained.clone()).await.is_err());
        assert!(sup.category_exists("A"));

        sup.cancel_task("A", "y").await.expect("cancel");
        let note = timeout(WAIT, drained).await.expect("in time").expect("drained");
        assert!(matches!(note, Notification::CategoryComplete { category } if category == Key::from("A")));
    }

    #[tokio::test]
    async fn cancel_category_cancels_every_task() {
        let sup = supervisor(Config::default());
        created(&sup, "A", "x", idle()).await;
        created(&sup, "A", "y", idle()).await;
        created(&sup, "B", "z", idle()).await;
        let drained = sup
            .subscribe_named("onCategoryComplete", Some("A".into()), None)
            .expect("subscribe");

        let reports = sup.cancel("A", None).await.expect("cancel");
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.status == TaskStatus::Cancelled));
        assert!(reports.iter().all(|r| r.result.is_none()));
        assert!(!sup.category_exists("A"));
        assert!(sup.category_exists("B"));
        assert!(timeout(WAIT, drained).await.expect("in time").is_ok());
    }

    #[tokio::test]
    async fn cancel_absent_is_noop() {
        let sup = supervisor(Config::default());
        assert!(sup.cancel_task("nope", "t").await.expect("cancel").is_none());
        assert!(sup.cancel("nope", None).await.expect("cancel").is_empty());
        assert!(sup.cancel("nope", Some("t".into())).await.expect("cancel").is_empty());
    }

    #[tokio::test]
    async fn all_complete_after_cancel_all() {
        let sup = supervisor(Config::default());
        created(&sup, "A", "x", idle()).await;
        created(&sup, "B", "y", idle()).await;
        let all = sup.subscribe(Event::AllComplete).expect("subscribe");

        timeout(WAIT, sup.cancel_all()).await.expect("cancelled");
        assert!(matches!(
            timeout(WAIT, all).await.expect("in time"),
            Ok(Notification::AllComplete)
        ));
        assert!(sup.is_active());
    }

    #[tokio::test]
    async fn failures_and_panics_become_results() {
        let sup = supervisor(Config::default());
        let failing: TaskRef = TaskFn::arc(|_ctx: CancellationToken| async {
            Err::<(), _>(TaskError::fail("db down"))
        });
        let explode = true;
        let panicking: TaskRef = TaskFn::arc(move |_ctx: CancellationToken| async move {
            if explode {
                panic!("boom");
            }
            Ok::<_, TaskError>(())
        });
        let eager: TaskRef = TaskFn::arc(move |_ctx: CancellationToken| {
            if explode {
                panic!("before the future");
            }
            async { Ok::<_, TaskError>(()) }
        });

        for (t, body, label) in [
            ("fail", failing, "task_failed"),
            ("panic", panicking, "task_panicked"),
            ("eager", eager, "task_panicked"),
        ] {
            let handle = created(&sup, "errors", t, body).await;
            timeout(WAIT, handle.retired()).await.expect("done");
            let report = handle.report().expect("report");
            assert_eq!(report.status, TaskStatus::Failed, "{t}");
            assert_eq!(report.result.error().map(TaskError::as_label), Some(label));
        }
        assert!(sup.is_active());
    }

    #[tokio::test]
    async fn cancelled_body_may_still_return_a_value() {
        let sup = supervisor(Config::default());
        let body: TaskRef = TaskFn::arc(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok::<_, TaskError>("partial")
        });
        let handle = created(&sup, "c", "t", body).await;
        wait_running(&handle).await;
        let report = sup.cancel_task("c", "t").await.expect("cancel").expect("report");
        assert_eq!(report.status, TaskStatus::Cancelled);
        assert_eq!(report.value::<&str>(), Some(&"partial"));
    }

    #[tokio::test]
    async fn cancelled_while_pending_never_runs_the_body() {
        let sup = supervisor(Config::default());
        let journal = Journal::default();
        let j = journal.clone();
        let body: TaskRef = TaskFn::arc(move |_ctx: CancellationToken| {
            let j = j.clone();
            async move {
                push(&j, "ran");
                Ok::<_, TaskError>("value")
            }
        });

        // nothing has yielded since `create`, so the runner is still behind its gate
        let handle = created(&sup, "c", "t", body).await;
        assert_eq!(handle.status(), TaskStatus::Pending);
        let report = sup.cancel_task("c", "t").await.expect("cancel").expect("report");

        assert_eq!(report.status, TaskStatus::Cancelled);
        assert!(report.result.is_none());
        assert!(lines(&journal).is_empty());
        assert!(!sup.task_exists("c", "t"));
    }

    #[tokio::test]
    async fn body_ignoring_cancel_is_still_cancelled_with_its_value() {
        let sup = supervisor(Config::default());
        let body: TaskRef = TaskFn::arc(|_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok::<_, TaskError>(42u32)
        });
        let handle = created(&sup, "c", "deaf", body).await;
        wait_running(&handle).await;

        let report = sup.cancel_task("c", "deaf").await.expect("cancel").expect("report");
        assert_eq!(report.status, TaskStatus::Cancelled);
        assert_eq!(report.value::<u32>(), Some(&42));
    }

    #[tokio::test]
    async fn cancel_grace_abandons_stuck_bodies() {
        let sup = supervisor(Config {
            cancel_grace: Some(Duration::from_millis(20)),
            ..Config::default()
        });
        let stuck: TaskRef = TaskFn::arc(|_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, TaskError>(())
        });
        let handle = created(&sup, "c", "stuck", stuck).await;
        wait_running(&handle).await;

        let report = timeout(WAIT, sup.cancel_task("c", "stuck"))
            .await
            .expect("bounded")
            .expect("cancel")
            .expect("report");
        assert_eq!(report.status, TaskStatus::Cancelled);
        assert!(report.result.is_none());
        assert!(!sup.task_exists("c", "stuck"));
    }

    #[tokio::test]
    async fn subscription_errors() {
        let sup = supervisor(Config::default());
        let err = sup
            .subscribe(Event::task_complete("c", "t"))
            .expect_err("missing");
        assert_eq!(err.as_label(), "manager_not_found");

        let err = sup.subscribe_named("onTaskCancelled", None, None).expect_err("unknown");
        assert_eq!(err.as_label(), "manager_unknown_event");

        let err = sup
            .subscribe_named("onTaskComplete", Some("c".into()), None)
            .expect_err("incomplete");
        assert_eq!(err.as_label(), "manager_validation");
    }

    #[tokio::test]
    async fn manager_killed_carries_sequence() {
        let a = supervisor(Config::default());
        let b = supervisor(Config::default());
        let ka = a.subscribe(Event::ManagerKilled).expect("subscribe");
        let kb = b.subscribe(Event::ManagerKilled).expect("subscribe");
        b.kill().await.expect("killed");
        a.kill().await.expect("killed");

        let seq = |n: Notification| match n {
            Notification::ManagerKilled { seq, .. } => seq,
            other => panic!("unexpected {other:?}"),
        };
        let sa = seq(ka.await.expect("a"));
        let sb = seq(kb.await.expect("b"));
        assert!(sb < sa);
    }

    #[tokio::test]
    async fn subscribing_after_kill_sees_the_kill() {
        let sup = supervisor(Config::default());
        sup.kill().await.expect("killed");

        let late = sup.subscribe(Event::ManagerKilled).expect("subscribe");
        match timeout(Duration::from_millis(100), late).await.expect("settled") {
            Ok(Notification::ManagerKilled { manager, .. }) => assert_eq!(manager, Key::from("test")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn symbols_are_distinct_keys() {
        let sup = supervisor(Config::default());
        let c1 = Key::symbol("jobs");
        let c2 = Key::symbol("jobs");
        sup.create(c1.clone(), "t", idle()).await.expect("create");
        sup.create(c2.clone(), "t", idle()).await.expect("create");
        assert_eq!(sup.categories().len(), 2);
        assert_eq!(sup.tasks().len(), 2);
        sup.cancel_category(c1.clone()).await.expect("cancel");
        assert!(!sup.category_exists(c1));
        assert!(sup.category_exists(c2));
    }

    struct Collect(Journal);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_record(&self, record: &LogRecord) {
            push(&self.0, &record.message);
        }
    }

    #[tokio::test]
    async fn lifecycle_records_reach_subscribers() {
        let journal = Journal::default();
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Collect(journal.clone()))];
        let sup = Supervisor::builder("logged")
            .with_config(Config {
                log: true,
                ..Config::default()
            })
            .with_subscribers(subs)
            .build();

        let quick: TaskRef = TaskFn::arc(|_ctx: CancellationToken| async { Ok::<_, TaskError>(1u8) });
        let handle = created(&sup, "c", "t", quick).await;
        timeout(WAIT, handle.retired()).await.expect("done");
        sup.kill().await.expect("killed");

        timeout(WAIT, async {
            while !lines(&journal).iter().any(|l| l == "Task Manager Killed") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("records delivered");

        let seen = lines(&journal);
        assert_eq!(seen[0], "Task Manager Constructed");
        for expected in ["Task Created: c.t", "Starting Kill Watcher", "Task Complete: c.t"] {
            assert!(seen.iter().any(|l| l == expected), "missing {expected}: {seen:?}");
        }
    }

    #[tokio::test]
    async fn no_records_without_log_flag() {
        let journal = Journal::default();
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Collect(journal.clone()))];
        let sup = Supervisor::builder("quiet").with_subscribers(subs).build();
        let handle = created(&sup, "c", "t", idle()).await;
        sup.kill().await.expect("killed");
        assert!(handle.is_retired());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(lines(&journal).is_empty());
    }
}
