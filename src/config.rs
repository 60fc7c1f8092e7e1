//! # Global device configuration.
//!
//! Provides [`Config`], centralized settings for the orchestrator and the
//! device runtime around it.
//!
//! ## Sentinel values
//! - `heartbeat_period = 0s` → no periodic action while started
//! - `phase_timeout = 0s` → a phase waits for its confirmations forever
//!
//! ## Known gaps kept by default
//! The defaults reproduce the device's historic behaviour: no phase deadline
//! (a collaborator that never answers stalls the orchestrator in Starting or
//! Stopping) and no sequence correlation between a confirmation and the
//! request it answers. Both can be hardened here.

use std::time::Duration;

use crate::buffers::MAX_ORDER;
use crate::events::Subsystem;

/// Global configuration for the device runtime.
///
/// ## Field semantics
/// - `expected_confirmations`: confirmations that close a Starting/Stopping phase
/// - `heartbeat_delay` / `heartbeat_period`: periodic action timer while Started
/// - `heartbeat_channel` / `heartbeat_value`: digital output driven on each tick
/// - `phase_timeout`: deadline for a phase (`0s` = none)
/// - `correlate_sequences`: ignore start confirmations for another request
/// - `fifo_order`: size of each serial-slave byte queue (`1 << order` bytes)
/// - `bus_capacity`: bus ring buffer size (min 1; clamped by Bus)
/// - `grace`: maximum wait for components to stop on shutdown
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of confirmations that completes a phase.
    ///
    /// One per subsystem collaborator.
    pub expected_confirmations: usize,

    /// Delay before the first heartbeat after entering Started.
    pub heartbeat_delay: Duration,

    /// Interval between heartbeats while Started.
    ///
    /// - `Duration::ZERO` = heartbeat disabled
    pub heartbeat_period: Duration,

    /// Digital output channel written on each heartbeat.
    pub heartbeat_channel: u8,

    /// Value written to `heartbeat_channel` on each heartbeat.
    pub heartbeat_value: u8,

    /// Deadline for collecting a phase's confirmations.
    ///
    /// - `Duration::ZERO` = no deadline (the orchestrator stalls if a collaborator never answers)
    /// - `> 0` = the phase aborts with [`ErrorCode::TIMEOUT`](crate::ErrorCode::TIMEOUT)
    pub phase_timeout: Duration,

    /// When `true`, start confirmations whose sequence differs from the phase's
    /// start requests are dropped instead of counted.
    pub correlate_sequences: bool,

    /// Order of the serial-slave byte FIFOs (capacity `1 << order`, clamped).
    pub fifo_order: u8,

    /// Capacity of the bus broadcast ring buffer.
    pub bus_capacity: usize,

    /// Maximum time to wait for components to stop during shutdown.
    pub grace: Duration,
}

impl Config {
    /// Returns the heartbeat schedule as `(initial delay, period)`, if enabled.
    #[inline]
    pub fn heartbeat(&self) -> Option<(Duration, Duration)> {
        if self.heartbeat_period == Duration::ZERO {
            None
        } else {
            Some((self.heartbeat_delay, self.heartbeat_period))
        }
    }

    /// Returns the phase deadline as an `Option`.
    #[inline]
    pub fn phase_deadline(&self) -> Option<Duration> {
        if self.phase_timeout == Duration::ZERO {
            None
        } else {
            Some(self.phase_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the FIFO order clamped to the supported maximum.
    #[inline]
    pub fn fifo_order_clamped(&self) -> u8 {
        self.fifo_order.min(MAX_ORDER)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `expected_confirmations = 5` (one per subsystem)
    /// - `heartbeat_delay = heartbeat_period = 2s`
    /// - `heartbeat_channel = 0`, `heartbeat_value = 1`
    /// - `phase_timeout = 0s` (no deadline)
    /// - `correlate_sequences = false`
    /// - `fifo_order = 7` (128 bytes)
    /// - `bus_capacity = 1024`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            expected_confirmations: Subsystem::ALL.len(),
            heartbeat_delay: Duration::from_millis(2000),
            heartbeat_period: Duration::from_millis(2000),
            heartbeat_channel: 0,
            heartbeat_value: 1,
            phase_timeout: Duration::ZERO,
            correlate_sequences: false,
            fifo_order: 7,
            bus_capacity: 1024,
            grace: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device() {
        let cfg = Config::default();
        assert_eq!(cfg.expected_confirmations, 5);
        assert_eq!(
            cfg.heartbeat(),
            Some((Duration::from_secs(2), Duration::from_secs(2)))
        );
        assert_eq!(cfg.phase_deadline(), None);
        assert!(!cfg.correlate_sequences);
    }

    #[test]
    fn sentinels_disable_features() {
        let cfg = Config {
            heartbeat_period: Duration::ZERO,
            bus_capacity: 0,
            fifo_order: 99,
            phase_timeout: Duration::from_millis(250),
            ..Config::default()
        };
        assert_eq!(cfg.heartbeat(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.fifo_order_clamped(), MAX_ORDER);
        assert_eq!(cfg.phase_deadline(), Some(Duration::from_millis(250)));
    }
}
