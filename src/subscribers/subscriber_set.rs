//! # Non-blocking record fan-out to multiple subscribers.
//!
//! ```text
//! emit(record)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_record()
//!     │    (bounded)         └──────► panic → tracing::warn!, continue
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_record()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_record()
//! ```
//!
//! ## Rules
//! - Per-subscriber FIFO; no ordering across subscribers.
//! - `emit` never waits: a full or closed queue drops the record for that subscriber only.
//! - A panicking subscriber is isolated with `catch_unwind`; its worker keeps going.
//!
//! Workers are spawned with `tokio::spawn`, so [`SubscriberSet::new`] must be
//! called from inside a runtime when the list is not empty.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::LogRecord;
use crate::subscribers::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<LogRecord>>,
}

/// Fan-out coordinator for record subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    dropped: AtomicU64,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber.
    ///
    /// `capacity` caps every queue; a subscriber asking for less gets less.
    /// The minimum capacity is 1.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, capacity: usize) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().min(capacity).max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<LogRecord>>(cap);

            let handle = tokio::spawn(async move {
                while let Some(record) = rx.recv().await {
                    let fut = sub.on_record(record.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = panic_message(&*panic_err);
                        tracing::warn!(subscriber = name, seq = record.seq, %info, "log subscriber panicked");
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self {
            channels,
            workers,
            dropped: AtomicU64::new(0),
        }
    }

    /// `true` when there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of records dropped so far because a queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Hands `record` to every subscriber queue.
    pub fn emit(&self, record: LogRecord) {
        self.emit_arc(Arc::new(record));
    }

    /// Same as [`emit`](Self::emit) for an already shared record.
    pub fn emit_arc(&self, record: Arc<LogRecord>) {
        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&record)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                subscriber = channel.name,
                seq = record.seq,
                reason,
                "log record dropped"
            );
        }
    }

    /// Closes every queue and waits for the workers to drain them.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}

pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
