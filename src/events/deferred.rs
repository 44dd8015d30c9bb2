//! # Single-shot event descriptors.
//!
//! A [`Deferred`] is a future with separate resolve and reject capabilities.
//! It is stored in the dispatcher's index under its event key and settled at
//! most once; every [`Subscription`] taken from it before or after settlement
//! observes the same outcome.
//!
//! ```text
//!  subscribe ──► Deferred (index) ──► Subscription ─┬─► waiter 1
//!                     │                             ├─► waiter 2
//!                emit / reject                      └─► waiter N
//!                     └────────► oneshot ──► Shared future
//! ```
//!
//! If the descriptor is dropped unsettled (the supervisor went away), waiters
//! get [`ManagerError::Dropped`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use tokio::sync::oneshot;

use crate::error::ManagerError;
use crate::events::event::Notification;

/// Outcome delivered to subscribers.
pub type Settled = Result<Notification, ManagerError>;

/// Awaitable, cloneable view of an event descriptor.
///
/// Clones share the same outcome.
#[derive(Clone)]
pub struct Subscription {
    inner: Shared<BoxFuture<'static, Settled>>,
}

impl Subscription {
    /// A subscription that is already settled.
    pub(crate) fn settled(outcome: Settled) -> Self {
        Self {
            inner: future::ready(outcome).boxed().shared(),
        }
    }

    /// Returns the outcome if some clone of this subscription has already observed it.
    pub fn peek(&self) -> Option<&Settled> {
        self.inner.peek()
    }
}

impl Future for Subscription {
    type Output = Settled;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("settled", &self.peek().is_some())
            .finish()
    }
}

/// Single-resolution descriptor.
pub(crate) struct Deferred {
    tx: Option<oneshot::Sender<Settled>>,
    subscription: Subscription,
}

impl Deferred {
    /// Creates an unsettled descriptor for `event` (used in the drop error).
    pub(crate) fn new(event: &'static str) -> Self {
        let (tx, rx) = oneshot::channel::<Settled>();
        let fut = async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(ManagerError::Dropped { event }),
            }
        };
        Self {
            tx: Some(tx),
            subscription: Subscription {
                inner: fut.boxed().shared(),
            },
        }
    }

    /// Returns a new view of this descriptor.
    pub(crate) fn subscribe(&self) -> Subscription {
        self.subscription.clone()
    }

    /// Resolves the descriptor. Returns `false` if it was already settled.
    pub(crate) fn resolve(&mut self, payload: Notification) -> bool {
        self.settle(Ok(payload))
    }

    /// Rejects the descriptor. Returns `false` if it was already settled.
    pub(crate) fn reject(&mut self, err: ManagerError) -> bool {
        self.settle(Err(err))
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.tx.is_none()
    }

    fn settle(&mut self, outcome: Settled) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // The descriptor keeps its own subscription alive, so the receiver is still there.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}
