//! I2C bus abstractions
//!
//! Provides the blocking controller-mode bus trait, target addressing and
//! the timing configuration used by the I2C engines.

use crate::error::{divisor_for, ConfigError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// I2C bus controller
///
/// Provides basic I2C read/write operations for communicating with
/// target devices.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error;

    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit or 10-bit target address
    /// * `data` - Bytes to write
    fn write(&mut self, address: Address, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit or 10-bit target address
    /// * `buf` - Buffer to read into
    fn read(&mut self, address: Address, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read in a single transaction (repeated start)
    ///
    /// This is commonly used to write a register address then read data.
    ///
    /// # Arguments
    /// * `address` - 7-bit or 10-bit target address
    /// * `write_data` - Bytes to write (typically register address)
    /// * `read_buf` - Buffer to read into
    fn write_read(
        &mut self,
        address: Address,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error>;
}

/// Target address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Address {
    /// Standard 7-bit address (0x00-0x7F)
    SevenBit(u8),
    /// Extended 10-bit address (0x000-0x3FF)
    TenBit(u16),
}

/// Prefix of the first byte of a 10-bit address (`11110xx`)
pub const TEN_BIT_PREFIX: u8 = 0b1111_0000;

impl Address {
    /// Check that the address fits its addressing mode
    pub fn validate(self) -> Result<Self, ConfigError> {
        match self {
            Address::SevenBit(a) if a > 0x7F => Err(ConfigError::InvalidAddress),
            Address::TenBit(a) if a > 0x3FF => Err(ConfigError::InvalidAddress),
            _ => Ok(self),
        }
    }

    /// Check if this is a 10-bit address
    pub fn is_ten_bit(self) -> bool {
        matches!(self, Address::TenBit(_))
    }

    /// First address byte on the wire, including the R/W bit
    ///
    /// For 10-bit addresses this is `11110 A9 A8 R/W`.
    pub fn head_byte(self, read: bool) -> u8 {
        let rw = read as u8;
        match self {
            Address::SevenBit(a) => (a << 1) | rw,
            Address::TenBit(a) => TEN_BIT_PREFIX | (((a >> 7) as u8) & 0b110) | rw,
        }
    }

    /// Second address byte for 10-bit addresses (`A7..A0`)
    pub fn tail_byte(self) -> Option<u8> {
        match self {
            Address::SevenBit(_) => None,
            Address::TenBit(a) => Some(a as u8),
        }
    }
}

impl From<u8> for Address {
    fn from(address: u8) -> Self {
        Address::SevenBit(address)
    }
}

/// Standard bus speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cSpeed {
    /// Standard mode (100 kHz)
    Standard,
    /// Fast mode (400 kHz)
    Fast,
    /// Fast mode plus (1 MHz)
    FastPlus,
}

impl I2cSpeed {
    /// SCL frequency in Hz
    pub const fn hz(self) -> u32 {
        match self {
            I2cSpeed::Standard => 100_000,
            I2cSpeed::Fast => 400_000,
            I2cSpeed::FastPlus => 1_000_000,
        }
    }
}

/// Default stretch timeout, in SCL periods
pub const STRETCH_TIMEOUT_PERIODS: u32 = 100;

/// Default number of ticks a sampled line may stay unknown
pub const DEFAULT_SETTLE_TICKS: u16 = 4;

/// I2C configuration
///
/// One SCL period is four phases (setup, rise, high, fall), each
/// `divisor` reference ticks long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct I2cConfig {
    /// Reference ticks per quarter SCL period
    pub divisor: u16,
    /// Reference ticks a target may hold SCL low before the transfer fails
    pub stretch_timeout: u32,
    /// Reference ticks a sampled line may stay unknown before a line fault
    pub settle_ticks: u16,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::with_divisor(4)
    }
}

impl I2cConfig {
    /// Configuration for a divisor, with the default stretch timeout
    pub const fn with_divisor(divisor: u16) -> Self {
        Self {
            divisor,
            stretch_timeout: STRETCH_TIMEOUT_PERIODS * 4 * divisor as u32,
            settle_ticks: DEFAULT_SETTLE_TICKS,
        }
    }

    /// Derive the divisor for a standard speed from the reference clock
    pub fn from_speed(reference_hz: u32, speed: I2cSpeed) -> Result<Self, ConfigError> {
        let divisor = divisor_for(reference_hz, speed.hz(), 4)?;
        Self::with_divisor(divisor).validate()
    }

    /// Reference ticks per full SCL period
    pub fn period_ticks(&self) -> u32 {
        self.divisor as u32 * 4
    }

    /// Check the configuration
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.divisor == 0 {
            return Err(ConfigError::DivisorTooSmall);
        }
        if self.stretch_timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(self)
    }
}
