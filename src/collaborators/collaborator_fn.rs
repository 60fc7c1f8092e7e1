//! # Function-backed collaborator (`CollaboratorFn`)
//!
//! [`CollaboratorFn`] wraps two closures, one per request kind, producing a
//! fresh future per request. Shared state, if any, goes into an explicit
//! `Arc<...>` captured by the closures.
//!
//! ## Example
//! ```rust
//! use devicevisor::{Collaborator, CollaboratorFn, CollaboratorRef, StartParams, Status, Subsystem};
//!
//! let dac: CollaboratorRef = CollaboratorFn::arc(
//!     Subsystem::Dac,
//!     |_p: StartParams| async { Status::Success },
//!     || async { Status::Success },
//! );
//! assert_eq!(dac.subsystem(), Subsystem::Dac);
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::collaborator::{Collaborator, CollaboratorRef, StartParams};
use crate::events::{Status, Subsystem};

/// Closure-backed collaborator.
pub struct CollaboratorFn<S, T> {
    subsystem: Subsystem,
    on_start: S,
    on_stop: T,
}

impl<S, T> CollaboratorFn<S, T> {
    /// Creates a new function-backed collaborator.
    ///
    /// Prefer [`CollaboratorFn::arc`] when you immediately need a [`CollaboratorRef`].
    pub fn new(subsystem: Subsystem, on_start: S, on_stop: T) -> Self {
        Self {
            subsystem,
            on_start,
            on_stop,
        }
    }

    /// Creates the collaborator and returns it as a shared handle.
    pub fn arc(subsystem: Subsystem, on_start: S, on_stop: T) -> Arc<Self> {
        Arc::new(Self::new(subsystem, on_start, on_stop))
    }
}

/// A collaborator that confirms every request with success.
pub fn ready(subsystem: Subsystem) -> CollaboratorRef {
    CollaboratorFn::arc(
        subsystem,
        |_p: StartParams| async { Status::Success },
        || async { Status::Success },
    )
}

#[async_trait]
impl<S, SF, T, TF> Collaborator for CollaboratorFn<S, T>
where
    S: Fn(StartParams) -> SF + Send + Sync + 'static,
    SF: Future<Output = Status> + Send + 'static,
    T: Fn() -> TF + Send + Sync + 'static,
    TF: Future<Output = Status> + Send + 'static,
{
    fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    async fn start(&self, params: StartParams) -> Status {
        (self.on_start)(params).await
    }

    async fn stop(&self) -> Status {
        (self.on_stop)().await
    }
}
