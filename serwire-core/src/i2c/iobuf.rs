//! Open-drain I/O buffer
//!
//! Combines our intended drive with what every other party puts on the
//! bus. The result is what the bit engines observe, which is how clock
//! stretching and contention become visible.

use serwire_hal::line::wired_and;

use super::{I2cDrive, I2cLines};

/// Open-drain buffer for SCL and SDA
#[derive(Debug, Clone, Default)]
pub struct IoBuf {
    drive: I2cDrive,
}

impl IoBuf {
    /// Create a buffer with both lines released
    pub fn new() -> Self {
        Self::default()
    }

    /// Our current drive
    pub fn drive(&self) -> I2cDrive {
        self.drive
    }

    /// Set our drive
    pub fn set(&mut self, drive: I2cDrive) {
        self.drive = drive;
    }

    /// Release both lines
    pub fn release(&mut self) {
        self.drive = I2cDrive::RELEASED;
    }

    /// Resolve the bus from the other parties' levels
    ///
    /// `external` is the wired-AND of everyone else (or the level read
    /// back from a physical pin, which already includes us).
    pub fn resolve(&self, external: I2cLines) -> I2cLines {
        I2cLines {
            scl: wired_and([self.drive.scl.level(), external.scl]),
            sda: wired_and([self.drive.sda.level(), external.sda]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serwire_hal::{Drive, Level};

    #[test]
    fn test_released_follows_external() {
        let io = IoBuf::new();
        let ext = I2cLines {
            scl: Level::Low,
            sda: Level::High,
        };
        assert_eq!(io.resolve(ext), ext);
    }

    #[test]
    fn test_own_low_wins() {
        let mut io = IoBuf::new();
        io.set(I2cDrive {
            scl: Drive::Low,
            sda: Drive::Release,
        });
        let lines = io.resolve(I2cLines::IDLE);
        assert_eq!(lines.scl, Level::Low);
        assert_eq!(lines.sda, Level::High);
    }

    #[test]
    fn test_unknown_external_masked_by_own_low() {
        let mut io = IoBuf::new();
        io.set(I2cDrive {
            scl: Drive::Release,
            sda: Drive::Low,
        });
        let lines = io.resolve(I2cLines {
            scl: Level::Unknown,
            sda: Level::Unknown,
        });
        assert_eq!(lines.scl, Level::Unknown);
        assert_eq!(lines.sda, Level::Low);
    }
}
