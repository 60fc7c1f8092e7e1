//! # Confirmation status carried by every reply on the bus.
//!
//! A [`Status`] is either [`Status::Success`] or a [`Status::Failure`] with an
//! [`ErrorCode`] and a free-form reason. The orchestrator only branches on
//! success versus failure; the code is carried through untouched so the
//! requester can tell subsystem failures apart.
//!
//! [`Fault`] is the same failure, tagged with the subsystem that reported it.
//! It is what the orchestrator records when a phase aborts.

use std::fmt;
use std::sync::Arc;

use super::subsystem::Subsystem;

/// Open set of subsystem-specific failure codes.
///
/// Subsystems are free to define their own values; the constants below are
/// reserved by the runtime itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    /// A phase did not collect its confirmations before the configured deadline.
    pub const TIMEOUT: ErrorCode = ErrorCode(0xFF01);
    /// A collaborator panicked while handling a request.
    pub const PANICKED: ErrorCode = ErrorCode(0xFF02);
    /// The orchestrator is faulted and refuses new requests.
    pub const FAULTED: ErrorCode = ErrorCode(0xFF03);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Outcome of a request, as reported in a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure { code: ErrorCode, reason: Arc<str> },
}

impl Status {
    /// Builds a failure status.
    pub fn failure(code: ErrorCode, reason: impl Into<Arc<str>>) -> Self {
        Status::Failure {
            code,
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    /// Returns the failure code, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Status::Success => None,
            Status::Failure { code, .. } => Some(*code),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("success"),
            Status::Failure { code, reason } => write!(f, "failure code={code} reason={reason}"),
        }
    }
}

/// A failure attributed to the subsystem that reported it.
///
/// `subsystem` is `None` when the runtime raised the failure on its own
/// (for example a phase deadline expiring).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub subsystem: Option<Subsystem>,
    pub code: ErrorCode,
    pub reason: Arc<str>,
}

impl Fault {
    /// Converts the fault back into the status echoed to requesters.
    pub fn to_status(&self) -> Status {
        Status::Failure {
            code: self.code,
            reason: Arc::clone(&self.reason),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subsystem {
            Some(s) => write!(f, "{s}: code={} reason={}", self.code, self.reason),
            None => write!(f, "runtime: code={} reason={}", self.code, self.reason),
        }
    }
}
