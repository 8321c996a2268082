//! UART serial communication abstractions
//!
//! Provides blocking traits for serial communication and the frame
//! configuration used by the UART engines.

use crate::error::{divisor_for, ConfigError};
use crate::i2c::DEFAULT_SETTLE_TICKS;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// UART transmitter
///
/// Blocking trait for sending data over a UART interface.
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Blocks until all data has been queued or an error occurs.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data
    ///
    /// Blocks until the last frame has left the line.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
///
/// Blocking trait for receiving data from a UART interface.
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Read data from the UART
    ///
    /// Blocks until the buffer is filled or an error occurs.
    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Read a single byte from the UART
    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8; 1];
        self.read_blocking(&mut buf)?;
        Ok(buf[0])
    }
}

/// Combined UART interface
///
/// For UARTs that provide both TX and RX on a single peripheral.
pub trait Uart: UartTx + UartRx {}

// Blanket implementation
impl<T: UartTx + UartRx> Uart for T {}

/// Smallest divisor that still leaves room for a mid-bit sample
pub const MIN_DIVISOR: u16 = 4;

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UartConfig {
    /// Reference ticks per bit
    pub divisor: u16,
    /// Number of data bits
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Reference ticks RX may stay unknown at a sample point
    pub settle_ticks: u16,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            divisor: 16,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            settle_ticks: DEFAULT_SETTLE_TICKS,
        }
    }
}

impl UartConfig {
    /// Derive the divisor for a baud rate from the reference clock (8N1)
    pub fn from_baudrate(reference_hz: u32, baudrate: u32) -> Result<Self, ConfigError> {
        let divisor = divisor_for(reference_hz, baudrate, 1)?;
        Self {
            divisor,
            ..Self::default()
        }
        .validate()
    }

    /// Total bits on the line for one frame, start bit included
    pub fn frame_bits(&self) -> u32 {
        let parity = if self.parity == Parity::None { 0 } else { 1 };
        1 + self.data_bits.count() as u32 + parity + self.stop_bits.count() as u32
    }

    /// Reference ticks for one full frame
    pub fn frame_ticks(&self) -> u32 {
        self.frame_bits() * self.divisor as u32
    }

    /// Mask covering the configured data width
    pub fn data_mask(&self) -> u16 {
        (1u16 << self.data_bits.count()) - 1
    }

    /// Check the configuration
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.divisor < MIN_DIVISOR {
            return Err(ConfigError::DivisorTooSmall);
        }
        Ok(self)
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
    Nine,
}

impl DataBits {
    /// Number of bits
    pub fn count(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
            DataBits::Nine => 9,
        }
    }

    /// Data bits from a bit count (5-9)
    pub fn from_count(count: u8) -> Option<Self> {
        match count {
            5 => Some(DataBits::Five),
            6 => Some(DataBits::Six),
            7 => Some(DataBits::Seven),
            8 => Some(DataBits::Eight),
            9 => Some(DataBits::Nine),
            _ => None,
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl Parity {
    /// Parity bit for `data`, or `None` when parity is disabled
    pub fn bit_for(self, data: u16) -> Option<bool> {
        let ones_odd = data.count_ones() % 2 == 1;
        match self {
            Parity::None => None,
            Parity::Even => Some(ones_odd),
            Parity::Odd => Some(!ones_odd),
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl StopBits {
    /// Number of bits
    pub fn count(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}
