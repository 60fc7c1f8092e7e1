//! # Messages exchanged over the device bus.
//!
//! Every [`Message`] is an immutable value with three capabilities:
//! - a [`Signal`] classifying it (used for subscriptions),
//! - an optional sequence number ([`Message::seq`]),
//! - an optional [`Status`] ([`Message::status`]).
//!
//! Messages fall into four groups:
//! - **System requests/confirmations**: exchanged with whoever drives the device;
//! - **Subsystem requests/confirmations**: fan-out to and replies from the collaborators;
//! - **Periodic**: heartbeat tick in, digital-output write out;
//! - **Internal**: `AllConfirmed`, `AnyFailed`, `PhaseTimeout`. These are posted by the
//!   orchestrator to the front of its own queue and never cross the bus.
//!
//! ## Example
//! ```rust
//! use devicevisor::{Message, Signal, Status, Subsystem};
//!
//! let cfm = Message::StartCfm {
//!     subsystem: Subsystem::Adc,
//!     seq: 4,
//!     status: Status::Success,
//! };
//! assert_eq!(cfm.signal(), Signal::StartCfm(Subsystem::Adc));
//! assert_eq!(cfm.seq(), Some(4));
//! assert!(cfm.status().is_some_and(Status::is_success));
//! ```

use crate::buffers::FifoPair;

use super::status::{Fault, Status};
use super::subsystem::Subsystem;

/// Sequence number tagging requests and echoed in their confirmations.
pub type Seq = u32;

/// Classification of a [`Message`], used to subscribe to a class of messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    SystemStartReq,
    SystemStopReq,
    SystemStartCfm,
    SystemStopCfm,
    StartReq(Subsystem),
    StopReq(Subsystem),
    StartCfm(Subsystem),
    StopCfm(Subsystem),
    HeartbeatTick,
    GpioWrite,
    AllConfirmed,
    AnyFailed,
    PhaseTimeout,
}

impl Signal {
    /// True for signals that must never leave the orchestrator.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Signal::AllConfirmed | Signal::AnyFailed | Signal::PhaseTimeout
        )
    }
}

/// A message on the device bus.
#[derive(Debug, Clone)]
pub enum Message {
    // === System level ===
    /// Request to bring every subsystem up.
    SystemStartReq { seq: Seq },
    /// Request to take every subsystem down (the orchestrator restarts afterwards).
    SystemStopReq { seq: Seq },
    /// Reply to [`Message::SystemStartReq`], echoing the request sequence.
    SystemStartCfm { seq: Seq, status: Status },
    /// Reply to [`Message::SystemStopReq`], echoing the request sequence.
    SystemStopCfm { seq: Seq, status: Status },

    // === Subsystem fan-out ===
    /// Start one subsystem. `fifos` is set for the I2C slave and the delegate only.
    StartReq {
        subsystem: Subsystem,
        seq: Seq,
        fifos: Option<FifoPair>,
    },
    /// Stop one subsystem.
    StopReq { subsystem: Subsystem },
    /// A subsystem's reply to its start request.
    StartCfm {
        subsystem: Subsystem,
        seq: Seq,
        status: Status,
    },
    /// A subsystem's reply to its stop request.
    StopCfm { subsystem: Subsystem, status: Status },

    // === Periodic ===
    /// Heartbeat timer fired.
    HeartbeatTick,
    /// Drive a digital output.
    GpioWrite { channel: u8, value: u8 },

    // === Internal ===
    /// Every confirmation of the current phase arrived with success.
    AllConfirmed,
    /// A confirmation of the current phase carried a failure.
    AnyFailed(Fault),
    /// The current phase did not complete before its deadline.
    PhaseTimeout,
}

impl Message {
    /// Returns the message classification.
    pub fn signal(&self) -> Signal {
        match self {
            Message::SystemStartReq { .. } => Signal::SystemStartReq,
            Message::SystemStopReq { .. } => Signal::SystemStopReq,
            Message::SystemStartCfm { .. } => Signal::SystemStartCfm,
            Message::SystemStopCfm { .. } => Signal::SystemStopCfm,
            Message::StartReq { subsystem, .. } => Signal::StartReq(*subsystem),
            Message::StopReq { subsystem } => Signal::StopReq(*subsystem),
            Message::StartCfm { subsystem, .. } => Signal::StartCfm(*subsystem),
            Message::StopCfm { subsystem, .. } => Signal::StopCfm(*subsystem),
            Message::HeartbeatTick => Signal::HeartbeatTick,
            Message::GpioWrite { .. } => Signal::GpioWrite,
            Message::AllConfirmed => Signal::AllConfirmed,
            Message::AnyFailed(_) => Signal::AnyFailed,
            Message::PhaseTimeout => Signal::PhaseTimeout,
        }
    }

    /// Returns the sequence number, for messages that carry one.
    pub fn seq(&self) -> Option<Seq> {
        match self {
            Message::SystemStartReq { seq }
            | Message::SystemStopReq { seq }
            | Message::SystemStartCfm { seq, .. }
            | Message::SystemStopCfm { seq, .. }
            | Message::StartReq { seq, .. }
            | Message::StartCfm { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    /// Returns the status, for confirmations.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Message::SystemStartCfm { status, .. }
            | Message::SystemStopCfm { status, .. }
            | Message::StartCfm { status, .. }
            | Message::StopCfm { status, .. } => Some(status),
            _ => None,
        }
    }

    /// Returns the subsystem a fan-out message or reply belongs to.
    pub fn subsystem(&self) -> Option<Subsystem> {
        match self {
            Message::StartReq { subsystem, .. }
            | Message::StopReq { subsystem }
            | Message::StartCfm { subsystem, .. }
            | Message::StopCfm { subsystem, .. } => Some(*subsystem),
            Message::AnyFailed(fault) => fault.subsystem,
            _ => None,
        }
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        self.signal().is_internal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ErrorCode;

    #[test]
    fn stop_confirmations_carry_no_sequence() {
        let msg = Message::StopCfm {
            subsystem: Subsystem::Gpio,
            status: Status::Success,
        };
        assert_eq!(msg.seq(), None);
        assert_eq!(msg.subsystem(), Some(Subsystem::Gpio));
        assert_eq!(msg.signal(), Signal::StopCfm(Subsystem::Gpio));
    }

    #[test]
    fn internal_signals_are_flagged() {
        let failed = Message::AnyFailed(Fault {
            subsystem: Some(Subsystem::I2cSlave),
            code: ErrorCode(9),
            reason: "nack".into(),
        });
        assert!(failed.is_internal());
        assert!(Message::AllConfirmed.is_internal());
        assert!(Message::PhaseTimeout.is_internal());
        assert!(!Message::HeartbeatTick.is_internal());
        assert!(!Message::SystemStartReq { seq: 0 }.is_internal());
        assert_eq!(failed.subsystem(), Some(Subsystem::I2cSlave));
    }

    #[test]
    fn requests_expose_their_sequence() {
        assert_eq!(Message::SystemStopReq { seq: 12 }.seq(), Some(12));
        assert_eq!(Message::StopReq { subsystem: Subsystem::Dac }.seq(), None);
        assert!(Message::GpioWrite { channel: 0, value: 1 }.status().is_none());
    }
}
