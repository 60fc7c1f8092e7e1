//! # Inbox: a component's single-consumer queue.
//!
//! Combines two lanes:
//! - a **front lane** (`VecDeque`) for messages the component posts to itself;
//! - the **bus lane**, a broadcast receiver filtered by the component's
//!   subscriptions.
//!
//! ```text
//!   post_front(m) ──► [front lane] ─┐
//!                                   ├──► pop_front() / recv() ──► component step
//!   Bus ──► filter(Signal) ─────────┘    (front lane always first)
//! ```
//!
//! ## Rules
//! - Front-lane messages preempt everything already waiting on the bus.
//! - `post_front` is LIFO: the most recently posted message is taken first.
//! - Messages outside the subscription set are dropped silently (this includes
//!   the component's own publications echoed back by the broadcast channel).
//! - Bus lag is logged and skipped; a closed bus ends the inbox.

use std::collections::{HashSet, VecDeque};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::error::RuntimeError;
use crate::events::{Bus, Message, Signal};

pub struct Inbox {
    front: VecDeque<Message>,
    rx: broadcast::Receiver<Message>,
    subscriptions: HashSet<Signal>,
    owner: &'static str,
}

impl Inbox {
    /// Subscribes to `bus` immediately; messages published afterwards are observed.
    pub fn new(
        owner: &'static str,
        bus: &Bus,
        subscriptions: impl IntoIterator<Item = Signal>,
    ) -> Self {
        Self {
            front: VecDeque::new(),
            rx: bus.subscribe(),
            subscriptions: subscriptions.into_iter().collect(),
            owner,
        }
    }

    /// Queues `msg` ahead of every pending message.
    pub fn post_front(&mut self, msg: Message) {
        self.front.push_front(msg);
    }

    /// Takes the next self-posted message, if any.
    pub fn pop_front(&mut self) -> Option<Message> {
        self.front.pop_front()
    }

    /// Waits for the next subscribed message from the bus.
    ///
    /// Cancel-safe: dropping the future loses no message.
    pub async fn recv(&mut self) -> Result<Message, RuntimeError> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if self.subscriptions.contains(&msg.signal()) => return Ok(msg),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!(owner = self.owner, skipped = n, "inbox lagged behind bus");
                }
                Err(RecvError::Closed) => return Err(RuntimeError::BusClosed),
            }
        }
    }
}
