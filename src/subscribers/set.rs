//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each bus [`Message`] to multiple subscribers
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Message)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow (the message is dropped for
//!   that subscriber).
//!
//! ## Diagram
//! ```text
//!    emit(&Message)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_message()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_message()
//!        └────────────────► [queue SN] ─► worker SN ─► on_message()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, warn};

use crate::events::Message;

use super::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Message>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Message>>(cap);

            let handle = tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    let fut = sub.on_message(msg.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await
                    {
                        let info = panic_err
                            .downcast_ref::<&'static str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| panic_err.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        error!(subscriber = sub.name(), %info, "subscriber panicked");
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Fan-out one message to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is full or closed, the message is dropped for it
    /// and a warning is logged with the subscriber's name.
    pub fn emit(&self, msg: &Message) {
        let shared = Arc::new(msg.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&shared)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscriber = channel.name,
                        signal = ?msg.signal(),
                        "subscriber dropped message: queue full"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(
                        subscriber = channel.name,
                        signal = ?msg.signal(),
                        "subscriber dropped message: worker closed"
                    );
                }
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Status, Subsystem};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_message(&self, msg: &Message) {
            self.seen.lock().expect("lock").push(msg.clone());
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploder;

    #[async_trait]
    impl Subscribe for Exploder {
        async fn on_message(&self, _msg: &Message) {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "exploder"
        }
    }

    #[tokio::test]
    async fn delivers_in_order_despite_panicking_neighbour() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![Arc::new(Exploder), rec.clone()]);
        assert_eq!(set.len(), 2);

        set.emit(&Message::SystemStartReq { seq: 3 });
        set.emit(&Message::StartCfm {
            subsystem: Subsystem::Adc,
            seq: 3,
            status: Status::Success,
        });
        set.shutdown().await;

        let seen = rec.seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], Message::SystemStartReq { seq: 3 }));
        assert_eq!(seen[1].subsystem(), Some(Subsystem::Adc));
    }

    #[tokio::test]
    async fn empty_set_accepts_messages() {
        let set = SubscriberSet::new(Vec::new());
        assert!(set.is_empty());
        set.emit(&Message::HeartbeatTick);
        set.shutdown().await;
    }
}
