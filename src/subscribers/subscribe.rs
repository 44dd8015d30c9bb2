//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for consuming lifecycle [`LogRecord`]s.
//! Each subscriber is driven by its own worker loop fed by a bounded queue
//! owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they never block the
//!   supervisor nor other subscribers.
//! - The queue size comes from [`Subscribe::queue_capacity`]. Records that do
//!   not fit are dropped for that subscriber only (reported via `tracing::warn!`).
//!
//! ## Example
//! ```rust
//! use catvisor::{LogRecord, Subscribe};
//!
//! struct Audit;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Audit {
//!     async fn on_record(&self, record: &LogRecord) {
//!         let _ = record.headline();
//!     }
//!     fn name(&self) -> &'static str { "audit" }
//!     fn queue_capacity(&self) -> usize { 512 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::LogRecord;

/// Contract for log record subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one record.
    async fn on_record(&self, record: &LogRecord);

    /// Human-readable name (for diagnostics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
