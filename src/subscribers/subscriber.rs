//! # Bus subscriber trait.
//!
//! Provides [`Subscribe`], an extension point for observing every message that
//! crosses the device bus (requests, confirmations, heartbeat writes).
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and logged)
//!
//! ## Architecture
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_message()
//!                                    └─► panic caught → tracing::error!
//! ```
//!
//! ## Rules
//! - A slow subscriber only affects its own queue.
//! - Queue overflow drops the message for this subscriber only.
//! - Messages are processed sequentially (FIFO) per subscriber.
//! - Subscribers never block the orchestrator or the collaborators.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use devicevisor::{Message, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_message(&self, msg: &Message) {
//!         if msg.status().is_some_and(|s| !s.is_success()) {
//!             // bump a counter, raise an alert...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failures" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Message;

/// Bus observer.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single bus message.
    ///
    /// Called from a dedicated worker task, in bus order.
    async fn on_message(&self, msg: &Message);

    /// Name used in overflow/panic logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity; clamped to a minimum of 1.
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
