//! I2C controller-mode engines
//!
//! Layering, leaves first:
//!
//! - [`iobuf`] - open-drain resolution of our drive against the bus
//! - [`bit_rx`] - SDA/SCL sampling, START/STOP detection, stretch detection
//! - [`bit_tx`] - one SCL cycle per symbol (bit, START, STOP)
//! - [`byte_tx`] / [`byte_rx`] - eight bits plus the ack slot
//! - [`controller`] - transaction sequencing and the host surface

pub mod bit_rx;
pub mod bit_tx;
pub mod byte_rx;
pub mod byte_tx;
pub mod controller;
pub mod iobuf;

pub use controller::{I2cController, I2cState};
pub use iobuf::IoBuf;

use serwire_hal::{Drive, Level};

/// Observed levels of both bus lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cLines {
    pub scl: Level,
    pub sda: Level,
}

impl I2cLines {
    /// Both lines pulled up, no one driving
    pub const IDLE: Self = Self {
        scl: Level::High,
        sda: Level::High,
    };

    /// Check if the bus is idle (both lines high)
    pub fn is_idle(&self) -> bool {
        self.scl.is_high() && self.sda.is_high()
    }
}

impl Default for I2cLines {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Open-drain drive of both bus lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cDrive {
    pub scl: Drive,
    pub sda: Drive,
}

impl I2cDrive {
    /// Both lines released
    pub const RELEASED: Self = Self {
        scl: Drive::Release,
        sda: Drive::Release,
    };

    /// Levels this drive contributes on its own
    pub fn levels(&self) -> I2cLines {
        I2cLines {
            scl: self.scl.level(),
            sda: self.sda.level(),
        }
    }

    /// Check if both lines are released
    pub fn is_released(&self) -> bool {
        self.scl.is_released() && self.sda.is_released()
    }
}
