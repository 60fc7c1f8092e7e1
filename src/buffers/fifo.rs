//! # Fixed-capacity byte ring buffer.
//!
//! [`ByteFifo`] backs the serial-slave byte queues. Capacity is always a power
//! of two, given as an *order* (`capacity = 1 << order`), so indices wrap with a
//! mask instead of a modulo.
//!
//! ```text
//!            head (next read)      tail (next write)
//!              ▼                     ▼
//!   [ . . . . x x x x x x x x x x x . . . . ]
//!              └────── len ──────┘
//! ```
//!
//! The orchestrator only owns the buffers and hands them to the I2C slave and
//! the delegate inside their start requests ([`FifoPair`]); it never touches the
//! contents.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::FifoError;

/// Largest accepted order (64 KiB).
pub const MAX_ORDER: u8 = 16;

/// Fixed-capacity FIFO of bytes.
pub struct ByteFifo {
    buf: Box<[u8]>,
    mask: usize,
    head: usize,
    len: usize,
}

impl ByteFifo {
    /// Creates an empty FIFO holding `1 << order` bytes (order clamped to [`MAX_ORDER`]).
    pub fn with_order(order: u8) -> Self {
        let cap = 1usize << order.min(MAX_ORDER);
        Self {
            buf: vec![0u8; cap].into_boxed_slice(),
            mask: cap - 1,
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Free space in bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Appends one byte.
    pub fn push(&mut self, byte: u8) -> Result<(), FifoError> {
        if self.is_full() {
            return Err(FifoError::Full {
                capacity: self.capacity(),
            });
        }
        let tail = (self.head + self.len) & self.mask;
        self.buf[tail] = byte;
        self.len += 1;
        Ok(())
    }

    /// Removes the oldest byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buf[self.head];
        self.head = (self.head + 1) & self.mask;
        self.len -= 1;
        Some(byte)
    }

    /// Returns the oldest byte without removing it.
    pub fn peek(&self) -> Option<u8> {
        (!self.is_empty()).then(|| self.buf[self.head])
    }

    /// Appends as many bytes of `data` as fit; returns how many were written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.remaining());
        for &b in &data[..n] {
            let tail = (self.head + self.len) & self.mask;
            self.buf[tail] = b;
            self.len += 1;
        }
        n
    }

    /// Moves up to `out.len()` bytes into `out`; returns how many were read.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        for slot in &mut out[..n] {
            *slot = self.buf[self.head];
            self.head = (self.head + 1) & self.mask;
        }
        self.len -= n;
        n
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

impl fmt::Debug for ByteFifo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteFifo")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish()
    }
}

/// A FIFO shared between its owner and the collaborator operating on it.
pub type SharedFifo = Arc<Mutex<ByteFifo>>;

/// The serial slave's outbound and inbound byte queues.
///
/// Cloning shares the same buffers.
#[derive(Clone, Debug)]
pub struct FifoPair {
    /// Bytes queued for the bus master to read.
    pub outbound: SharedFifo,
    /// Bytes written by the bus master.
    pub inbound: SharedFifo,
}

impl FifoPair {
    /// Allocates both queues with `1 << order` bytes each.
    pub fn with_order(order: u8) -> Self {
        Self {
            outbound: Arc::new(Mutex::new(ByteFifo::with_order(order))),
            inbound: Arc::new(Mutex::new(ByteFifo::with_order(order))),
        }
    }

    /// True if `other` refers to the very same buffers.
    pub fn same_as(&self, other: &FifoPair) -> bool {
        Arc::ptr_eq(&self.outbound, &other.outbound) && Arc::ptr_eq(&self.inbound, &other.inbound)
    }
}
