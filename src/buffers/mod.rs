//! Shared byte buffers handed to the serial-slave collaborators.

mod fifo;

pub use fifo::{ByteFifo, FifoPair, SharedFifo, MAX_ORDER};
