//! Runtime core: the lifecycle state machine and everything that drives it.
//!
//! Internal modules:
//! - [`machine`]: the pure orchestrator state machine (states, effects, aggregation);
//! - [`inbox`]: the orchestrator's queue (front lane + filtered bus receiver);
//! - [`runner`]: run-to-completion loop, timers and state publication;
//! - [`device`]: wires orchestrator, collaborator hosts and subscribers; graceful shutdown;
//! - [`builder`]: assembles a [`Device`];
//! - [`handle`]: request/confirmation surface for callers;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod device;
mod handle;
mod inbox;
mod machine;
mod runner;
mod shutdown;

pub use builder::DeviceBuilder;
pub use device::Device;
pub use handle::DeviceHandle;
pub use machine::{Effect, Orchestrator, Snapshot, State};
