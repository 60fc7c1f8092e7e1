//! Device messages: contract types and broadcast bus.
//!
//! This module groups the message **data model** exchanged between the
//! orchestrator and the subsystem collaborators, and the **bus** carrying it.
//!
//! ## Contents
//! - [`Message`], [`Signal`], [`Seq`] the message contract
//! - [`Status`], [`ErrorCode`], [`Fault`] confirmation outcomes
//! - [`Subsystem`] the five collaborators
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod message;
mod status;
mod subsystem;

pub use bus::Bus;
pub use message::{Message, Seq, Signal};
pub use status::{ErrorCode, Fault, Status};
pub use subsystem::Subsystem;
