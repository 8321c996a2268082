//! SPI bus abstractions
//!
//! Provides the blocking controller-mode bus trait and the clocking
//! configuration used by the SPI engines.

use crate::error::{divisor_for, ConfigError};
use crate::i2c::DEFAULT_SETTLE_TICKS;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// SPI bus controller
///
/// Provides basic SPI transfer operations for communicating with
/// peripheral devices. Every call is framed by one chip-select assertion.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Transfer data (simultaneous read/write)
    ///
    /// Writes data from `write` buffer while reading into `read` buffer.
    /// Both buffers must be the same length.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error>;

    /// Write data without reading
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data (writes zeros)
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Transfer data in place
    ///
    /// Writes data from buffer while reading into the same buffer.
    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error>;
}

/// Smallest supported word size in bits
pub const MIN_WORD_BITS: u8 = 4;

/// Largest supported word size in bits
pub const MAX_WORD_BITS: u8 = 16;

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiConfig {
    /// Reference ticks per half SCLK period
    pub divisor: u16,
    /// Clock polarity and phase
    pub mode: Mode,
    /// Shift order of each word
    pub bit_order: BitOrder,
    /// Bits per word (4-16)
    pub word_bits: u8,
    /// Reference ticks MISO may stay unknown at a capture edge
    pub settle_ticks: u16,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            divisor: 2,
            mode: Mode::Mode0,
            bit_order: BitOrder::MsbFirst,
            word_bits: 8,
            settle_ticks: DEFAULT_SETTLE_TICKS,
        }
    }
}

impl SpiConfig {
    /// Derive the divisor for an SCLK frequency from the reference clock
    pub fn from_frequency(reference_hz: u32, sclk_hz: u32, mode: Mode) -> Result<Self, ConfigError> {
        let divisor = divisor_for(reference_hz, sclk_hz, 2)?;
        Self {
            divisor,
            mode,
            ..Self::default()
        }
        .validate()
    }

    /// Bytes used to carry one word in a transfer buffer
    ///
    /// Words up to 8 bits take one byte; wider words take two,
    /// little-endian.
    pub fn bytes_per_word(&self) -> usize {
        if self.word_bits > 8 {
            2
        } else {
            1
        }
    }

    /// Mask covering the configured word width
    pub fn word_mask(&self) -> u16 {
        if self.word_bits >= 16 {
            u16::MAX
        } else {
            (1u16 << self.word_bits) - 1
        }
    }

    /// Check the configuration
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.divisor == 0 {
            return Err(ConfigError::DivisorTooSmall);
        }
        if !(MIN_WORD_BITS..=MAX_WORD_BITS).contains(&self.word_bits) {
            return Err(ConfigError::InvalidWordSize);
        }
        Ok(self)
    }
}

/// Order in which bits of a word are shifted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    /// Mode from its conventional number (0-3)
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Mode::Mode0),
            1 => Some(Mode::Mode1),
            2 => Some(Mode::Mode2),
            3 => Some(Mode::Mode3),
            _ => None,
        }
    }

    /// Clock polarity of this mode
    pub fn polarity(self) -> Polarity {
        let (polarity, _) = self.into();
        polarity
    }

    /// Clock phase of this mode
    pub fn phase(self) -> Phase {
        let (_, phase) = self.into();
        phase
    }

    /// SCLK level while idle
    pub fn idle_high(self) -> bool {
        self.polarity() == Polarity::IdleHigh
    }

    /// Check if data is captured on the leading (idle to active) edge
    pub fn captures_on_leading(self) -> bool {
        self.phase() == Phase::CaptureOnFirstTransition
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_table() {
        assert!(!Mode::Mode0.idle_high());
        assert!(Mode::Mode0.captures_on_leading());
        assert!(!Mode::Mode1.captures_on_leading());
        assert!(Mode::Mode2.idle_high());
        assert!(Mode::Mode3.idle_high());
        assert!(!Mode::Mode3.captures_on_leading());
        assert_eq!(Mode::from_index(2), Some(Mode::Mode2));
        assert_eq!(Mode::from_index(4), None);
    }

    #[test]
    fn test_word_layout() {
        let mut cfg = SpiConfig::default();
        assert_eq!(cfg.bytes_per_word(), 1);
        assert_eq!(cfg.word_mask(), 0xFF);
        cfg.word_bits = 12;
        assert_eq!(cfg.bytes_per_word(), 2);
        assert_eq!(cfg.word_mask(), 0x0FFF);
        cfg.word_bits = 16;
        assert_eq!(cfg.word_mask(), 0xFFFF);
    }

    #[test]
    fn test_word_size_validation() {
        let cfg = SpiConfig {
            word_bits: 3,
            ..SpiConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidWordSize));
    }

    #[test]
    fn test_from_frequency() {
        let cfg = SpiConfig::from_frequency(8_000_000, 1_000_000, Mode::Mode3).unwrap();
        assert_eq!(cfg.divisor, 4);
        assert_eq!(cfg.mode, Mode::Mode3);
    }
}
