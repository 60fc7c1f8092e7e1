//! # Collaborator abstraction.
//!
//! A [`Collaborator`] is the device-side implementation of one
//! [`Subsystem`]: it is asked to start (with the request's [`StartParams`]) and
//! to stop, and answers each request with a [`Status`]. The
//! [`CollaboratorHost`](crate::CollaboratorHost) turns those answers into
//! confirmations on the bus.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use devicevisor::{Collaborator, StartParams, Status, Subsystem};
//!
//! struct Adc;
//!
//! #[async_trait]
//! impl Collaborator for Adc {
//!     fn subsystem(&self) -> Subsystem { Subsystem::Adc }
//!
//!     async fn start(&self, _params: StartParams) -> Status {
//!         // power up, calibrate...
//!         Status::Success
//!     }
//!
//!     async fn stop(&self) -> Status {
//!         Status::Success
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::buffers::FifoPair;
use crate::events::{Seq, Status, Subsystem};

/// Payload of a start request, as seen by a collaborator.
#[derive(Clone, Debug)]
pub struct StartParams {
    /// Sequence number of the start request.
    pub seq: Seq,
    /// Serial-slave byte queues; set for the I2C slave and the delegate only.
    pub fifos: Option<FifoPair>,
}

/// Device-side implementation of one subsystem.
///
/// Requests to one collaborator are delivered sequentially; different
/// collaborators run concurrently.
#[async_trait]
pub trait Collaborator: Send + Sync + 'static {
    /// The subsystem this collaborator answers for.
    fn subsystem(&self) -> Subsystem;

    /// Brings the subsystem up.
    async fn start(&self, params: StartParams) -> Status;

    /// Takes the subsystem down.
    async fn stop(&self) -> Status;
}

/// Shared handle to a collaborator.
pub type CollaboratorRef = Arc<dyn Collaborator>;
