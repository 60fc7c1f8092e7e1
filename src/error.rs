//! Error types used by the devicevisor runtime.
//!
//! This module defines three error enums:
//!
//! - [`RuntimeError`]: errors raised by the device runtime itself.
//! - [`RequestError`]: errors returned to callers of [`DeviceHandle`](crate::DeviceHandle).
//! - [`FifoError`]: errors from the shared byte FIFOs.
//!
//! Subsystem failures are **not** Rust errors: they travel as a
//! [`Status`](crate::Status) inside confirmations.

use std::time::Duration;
use thiserror::Error;

use crate::events::Status;

/// # Errors produced by the device runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some components did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Components that did not shut down in time.
        stuck: Vec<String>,
    },

    /// The bus was closed while a component was still waiting on it.
    #[error("device bus closed")]
    BusClosed,

    /// Installing the OS signal listeners failed.
    #[error("signal registration failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use devicevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::BusClosed => "runtime_bus_closed",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Errors returned to callers waiting on a system confirmation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RequestError {
    /// No confirmation arrived within the caller's deadline.
    #[error("no confirmation after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The device confirmed the request with a failure status.
    #[error("request rejected: {status}")]
    Rejected {
        /// The failure status echoed by the orchestrator.
        status: Status,
    },

    /// The device bus or state channel is gone.
    #[error("device closed")]
    Closed,
}

impl RequestError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RequestError::Timeout { .. } => "request_timeout",
            RequestError::Rejected { .. } => "request_rejected",
            RequestError::Closed => "request_closed",
        }
    }
}

/// # Errors from a [`ByteFifo`](crate::ByteFifo).
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FifoError {
    /// The buffer has no room left.
    #[error("fifo full (capacity {capacity})")]
    Full {
        /// Buffer capacity in bytes.
        capacity: usize,
    },
}
