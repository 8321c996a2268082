//! I2C byte transmit engine
//!
//! Shifts a byte out MSB first, then releases SDA for the ack slot and
//! reports whether the target acknowledged.

use super::bit_tx::{BitEvent, I2cBitTx, Symbol};
use super::I2cLines;
use crate::error::ErrorKind;

/// Outcome of one reference tick of a byte engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteEvent {
    /// No byte in progress
    Idle,
    /// Byte in progress
    Busy,
    /// Stopped at a bit boundary on request; SCL is low
    Halted,
    /// Transmitted byte was acknowledged
    Acked,
    /// Transmitted byte was not acknowledged
    Nacked,
    /// Byte received and our ack slot sent
    Received(u8),
    /// Bit-level fault; lines already released
    Fault(ErrorKind),
}

/// Slot index of the acknowledge bit
pub(crate) const ACK_SLOT: u8 = 8;

/// I2C byte transmitter
#[derive(Debug, Clone, Default)]
pub struct I2cByteTx {
    byte: u8,
    bit: u8,
    active: bool,
}

impl I2cByteTx {
    /// Create an idle engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a byte is being shifted
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Check if the ack slot is in progress
    pub fn in_ack_slot(&self) -> bool {
        self.active && self.bit == ACK_SLOT
    }

    /// Start shifting a byte
    ///
    /// Rejected with [`ErrorKind::Busy`] while a byte is in progress.
    pub fn load(&mut self, byte: u8, bits: &mut I2cBitTx) -> Result<(), ErrorKind> {
        if self.active {
            return Err(ErrorKind::Busy);
        }
        bits.begin(Symbol::Drive(byte & 0x80 != 0))?;
        self.byte = byte;
        self.bit = 0;
        self.active = true;
        Ok(())
    }

    /// Drop the byte in progress
    pub fn reset(&mut self) {
        self.active = false;
    }

    /// Advance one reference tick
    ///
    /// With `halt` set the engine stops at the next bit boundary instead
    /// of starting the following bit.
    pub fn tick(&mut self, bits: &mut I2cBitTx, lines: I2cLines, halt: bool) -> ByteEvent {
        if !self.active {
            return ByteEvent::Idle;
        }
        match bits.tick(lines) {
            BitEvent::Idle | BitEvent::Busy => ByteEvent::Busy,
            BitEvent::Fault(kind) => {
                self.active = false;
                ByteEvent::Fault(kind)
            }
            BitEvent::Done(sampled) => {
                if self.bit == ACK_SLOT {
                    self.active = false;
                    // Target pulls SDA low to acknowledge
                    return if sampled {
                        ByteEvent::Nacked
                    } else {
                        ByteEvent::Acked
                    };
                }
                if halt {
                    self.active = false;
                    return ByteEvent::Halted;
                }
                self.bit += 1;
                let symbol = if self.bit == ACK_SLOT {
                    Symbol::Release
                } else {
                    Symbol::Drive(self.byte & (0x80 >> self.bit) != 0)
                };
                match bits.begin(symbol) {
                    Ok(()) => ByteEvent::Busy,
                    Err(kind) => {
                        self.active = false;
                        ByteEvent::Fault(kind)
                    }
                }
            }
        }
    }
}
