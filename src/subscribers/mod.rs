//! # Bus subscribers for the devicevisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used by the [`Device`](crate::Device) listener.
//!
//! ## Architecture
//! ```text
//! Orchestrator / hosts ── publish(Message) ──► Bus ──► Device listener
//!                                                          │
//!                                                 SubscriberSet::emit(&Message)
//!                                                          │
//!                                              ┌───────────┼───────────┐
//!                                              ▼           ▼           ▼
//!                                          LogWriter    Metrics     Custom
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub mod embedded;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;
