//! The five hardware-facing subsystems the orchestrator drives.

use std::fmt;

/// Identity of a subsystem collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subsystem {
    I2cSlave,
    Gpio,
    Adc,
    Dac,
    Delegate,
}

impl Subsystem {
    /// Every subsystem, in fan-out order: delegate and serial slave first.
    pub const ALL: [Subsystem; 5] = [
        Subsystem::Delegate,
        Subsystem::I2cSlave,
        Subsystem::Dac,
        Subsystem::Adc,
        Subsystem::Gpio,
    ];

    /// Short stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::I2cSlave => "i2c_slave",
            Subsystem::Gpio => "gpio",
            Subsystem::Adc => "adc",
            Subsystem::Dac => "dac",
            Subsystem::Delegate => "delegate",
        }
    }

    /// True for subsystems whose start request carries the shared byte FIFOs.
    #[inline]
    pub fn uses_fifos(&self) -> bool {
        matches!(self, Subsystem::I2cSlave | Subsystem::Delegate)
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
