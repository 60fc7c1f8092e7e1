//! # Subsystem collaborators.
//!
//! The orchestrator never calls subsystem code directly; it only exchanges
//! request/confirmation messages. This module supplies the other end of that
//! contract:
//! - [`Collaborator`] - trait implemented by each subsystem
//! - [`CollaboratorFn`] - closure-backed implementation
//! - [`ready`] - collaborator that confirms everything (bring-up stubs, tests)
//! - [`CollaboratorHost`] - bus adapter turning requests into calls and answers into confirmations

mod collaborator;
mod collaborator_fn;
mod host;

pub use collaborator::{Collaborator, CollaboratorRef, StartParams};
pub use collaborator_fn::{ready, CollaboratorFn};
pub use host::CollaboratorHost;
