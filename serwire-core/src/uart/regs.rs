//! UART register block
//!
//! Word-addressed view of a [`Uart`] for bus-style hosts:
//!
//! | Offset | Register  | Access |
//! |--------|-----------|--------|
//! | `0x0`  | `TX_DATA` | W      |
//! | `0x4`  | `RX_DATA` | R      |
//! | `0x8`  | `STATUS`  | R      |
//! | `0xC`  | `CONTROL` | R/W    |
//!
//! `CONTROL` layout: bits 0-15 divisor, 16-19 data bit count (5-9), 20-21
//! parity (0 none, 1 even, 2 odd), 22 two stop bits, 24 blocking writes.
//! Every other bit is reserved and must be written as zero.

use serwire_hal::uart::MIN_DIVISOR;
use serwire_hal::{DataBits, Level, Parity, StopBits, UartConfig};

use super::byte_rx::{RxWord, RX_FRAMING_BIT, RX_PARITY_BIT};
use super::controller::{Uart, FIFO_DEPTH};

/// Offset of `TX_DATA`
pub const TX_DATA: u32 = 0x0;
/// Offset of `RX_DATA`
pub const RX_DATA: u32 = 0x4;
/// Offset of `STATUS`
pub const STATUS: u32 = 0x8;
/// Offset of `CONTROL`
pub const CONTROL: u32 = 0xC;

/// `RX_DATA` value when the RX FIFO is empty
pub const RX_EMPTY: u32 = 0xFFFF_FFFF;

const DIVISOR_MASK: u32 = 0xFFFF;
const DATA_BITS_SHIFT: u32 = 16;
const PARITY_SHIFT: u32 = 20;
const STOP_BIT: u32 = 1 << 22;
const BLOCKING_BIT: u32 = 1 << 24;
const RESERVED_MASK: u32 =
    !(DIVISOR_MASK | 0xF << DATA_BITS_SHIFT | 0x3 << PARITY_SHIFT | STOP_BIT | BLOCKING_BIT);

/// Behaviour of a `TX_DATA` write when the TX FIFO is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WritePolicy {
    /// Answer [`Access::Wait`] until there is room
    Block,
    /// Fail with [`BusError::NotReady`]
    #[default]
    NotReady,
}

/// Successful bus write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// Write accepted
    Done,
    /// Bus stalled; wait and retry the same write
    Wait,
}

/// Bus-level error response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Register cannot take the write now
    NotReady,
    /// No register at this offset
    Decode,
    /// Field value out of range or reserved bit set
    InvalidValue,
    /// Write to a read-only register
    ReadOnly,
    /// Read of a write-only register
    WriteOnly,
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BusError::NotReady => write!(f, "register not ready"),
            BusError::Decode => write!(f, "unmapped register offset"),
            BusError::InvalidValue => write!(f, "invalid register value"),
            BusError::ReadOnly => write!(f, "register is read-only"),
            BusError::WriteOnly => write!(f, "register is write-only"),
        }
    }
}

/// Encode a frame format and write policy as a `CONTROL` value
pub fn encode_control(config: &UartConfig, policy: WritePolicy) -> u32 {
    let parity = match config.parity {
        Parity::None => 0,
        Parity::Even => 1,
        Parity::Odd => 2,
    };
    let mut value = config.divisor as u32
        | (config.data_bits.count() as u32) << DATA_BITS_SHIFT
        | parity << PARITY_SHIFT;
    if config.stop_bits == StopBits::Two {
        value |= STOP_BIT;
    }
    if policy == WritePolicy::Block {
        value |= BLOCKING_BIT;
    }
    value
}

/// Decode a `CONTROL` value
///
/// Fields not carried by the register are taken from `base`.
pub fn decode_control(
    value: u32,
    base: &UartConfig,
) -> Result<(UartConfig, WritePolicy), BusError> {
    if value & RESERVED_MASK != 0 {
        return Err(BusError::InvalidValue);
    }
    let divisor = (value & DIVISOR_MASK) as u16;
    if divisor < MIN_DIVISOR {
        return Err(BusError::InvalidValue);
    }
    let data_bits = DataBits::from_count(((value >> DATA_BITS_SHIFT) & 0xF) as u8)
        .ok_or(BusError::InvalidValue)?;
    let parity = match (value >> PARITY_SHIFT) & 0x3 {
        0 => Parity::None,
        1 => Parity::Even,
        2 => Parity::Odd,
        _ => return Err(BusError::InvalidValue),
    };
    let stop_bits = if value & STOP_BIT != 0 {
        StopBits::Two
    } else {
        StopBits::One
    };
    let policy = if value & BLOCKING_BIT != 0 {
        WritePolicy::Block
    } else {
        WritePolicy::NotReady
    };
    let config = UartConfig {
        divisor,
        data_bits,
        parity,
        stop_bits,
        ..*base
    };
    Ok((config, policy))
}

/// Register view of a UART
pub struct UartRegs<const N: usize = FIFO_DEPTH> {
    uart: Uart<N>,
    policy: WritePolicy,
}

impl<const N: usize> UartRegs<N> {
    /// Wrap a UART; writes start out non-blocking
    pub fn new(uart: Uart<N>) -> Self {
        Self {
            uart,
            policy: WritePolicy::default(),
        }
    }

    /// Current write policy
    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// The wrapped UART
    pub fn uart(&self) -> &Uart<N> {
        &self.uart
    }

    /// The wrapped UART, mutably
    pub fn uart_mut(&mut self) -> &mut Uart<N> {
        &mut self.uart
    }

    /// Advance the UART one reference tick; returns the TX level
    pub fn tick(&mut self, rx: Level) -> Level {
        self.uart.tick(rx)
    }

    /// Bus read
    pub fn read(&mut self, offset: u32) -> Result<u32, BusError> {
        match offset {
            TX_DATA => Err(BusError::WriteOnly),
            RX_DATA => Ok(match self.uart.read() {
                Some(word) => word.to_register(),
                None => {
                    self.uart.note_underrun();
                    RX_EMPTY
                }
            }),
            STATUS => Ok(self.uart.take_status().bits()),
            CONTROL => Ok(encode_control(self.uart.config(), self.policy)),
            _ => Err(BusError::Decode),
        }
    }

    /// Bus write
    pub fn write(&mut self, offset: u32, value: u32) -> Result<Access, BusError> {
        match offset {
            TX_DATA => match self.uart.write((value & 0x1FF) as u16) {
                Ok(()) => Ok(Access::Done),
                Err(_) => match self.policy {
                    WritePolicy::Block => Ok(Access::Wait),
                    WritePolicy::NotReady => Err(BusError::NotReady),
                },
            },
            CONTROL => {
                let (config, policy) = decode_control(value, self.uart.config())?;
                self.uart
                    .configure(config)
                    .map_err(|_| BusError::NotReady)?;
                debug!("uart: control set to {=u32:#x}", value);
                self.policy = policy;
                Ok(Access::Done)
            }
            RX_DATA | STATUS => Err(BusError::ReadOnly),
            _ => Err(BusError::Decode),
        }
    }
}

/// Decode a raw `RX_DATA` value; `None` for [`RX_EMPTY`]
pub fn decode_rx(value: u32) -> Option<RxWord> {
    if value == RX_EMPTY {
        return None;
    }
    Some(RxWord {
        data: (value & 0x1FF) as u16,
        framing: value & RX_FRAMING_BIT != 0,
        parity: value & RX_PARITY_BIT != 0,
    })
}
