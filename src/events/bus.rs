//! # Device bus for publishing and subscribing to messages.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking publishing from multiple components (orchestrator, collaborator
//! hosts, device handles).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Receivers (many):
//!   DeviceHandle   ──┐                  ┌──► Orchestrator inbox (filtered by Signal)
//!   Orchestrator   ──┼──► Bus ──────────┼──► CollaboratorHost × 5 (own subsystem only)
//!   Collab. hosts  ──┘  (broadcast)     └──► subscriber listener ──► SubscriberSet
//! ```
//!
//! Every receiver sees every message; subscription by signal is applied on the
//! receiving side (see `core::inbox`).
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: a single ring buffer stores recent messages for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: messages are lost if nobody is subscribed at send time.
//! - **Internal signals stay home**: `AllConfirmed`/`AnyFailed`/`PhaseTimeout` are
//!   refused by `publish()`.

use tokio::sync::broadcast;

use super::message::Message;

/// Broadcast channel for device messages.
///
/// Cloning is cheap (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Message>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    ///
    /// Capacity is **shared** across all receivers (not per-subscriber).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Message>(capacity);
        Self { tx }
    }

    /// Publishes a message to all active receivers.
    ///
    /// Internal completion signals are dropped with a warning: they belong to
    /// the orchestrator's own queue.
    pub fn publish(&self, msg: Message) {
        if msg.is_internal() {
            tracing::warn!(signal = ?msg.signal(), "refusing to publish internal signal");
            return;
        }
        let _ = self.tx.send(msg);
    }

    /// Creates a new receiver that observes messages sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Status;

    #[tokio::test]
    async fn internal_signals_never_reach_receivers() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Message::AllConfirmed);
        bus.publish(Message::SystemStartCfm {
            seq: 3,
            status: Status::Success,
        });

        let got = rx.recv().await.expect("message");
        assert!(matches!(got, Message::SystemStartCfm { seq: 3, .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn capacity_is_clamped() {
        let bus = Bus::new(0);
        let _rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
        bus.publish(Message::HeartbeatTick);
    }
}
