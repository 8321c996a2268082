//! I2C byte receive engine
//!
//! Releases SDA for eight bits, assembles them MSB first, then drives our
//! ack (or nack) slot. A START or STOP seen mid-frame surfaces from the
//! bit engine as a bus fault and ends the frame immediately.

use super::bit_tx::{BitEvent, I2cBitTx, Symbol};
use super::byte_tx::{ByteEvent, ACK_SLOT};
use super::I2cLines;
use crate::error::ErrorKind;

/// I2C byte receiver
#[derive(Debug, Clone, Default)]
pub struct I2cByteRx {
    shift: u8,
    bit: u8,
    ack: bool,
    active: bool,
}

impl I2cByteRx {
    /// Create an idle engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a byte is being received
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Check if our ack slot is in progress
    pub fn in_ack_slot(&self) -> bool {
        self.active && self.bit == ACK_SLOT
    }

    /// Start receiving a byte
    ///
    /// `ack` selects what we answer in the ack slot; the last byte of a
    /// read is answered with a nack.
    pub fn start(&mut self, ack: bool, bits: &mut I2cBitTx) -> Result<(), ErrorKind> {
        if self.active {
            return Err(ErrorKind::Busy);
        }
        bits.begin(Symbol::Release)?;
        self.shift = 0;
        self.bit = 0;
        self.ack = ack;
        self.active = true;
        Ok(())
    }

    /// Drop the byte in progress
    pub fn reset(&mut self) {
        self.active = false;
    }

    /// Advance one reference tick
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
                    return ByteEvent::Received(self.shift);
                }
                self.shift = (self.shift << 1) | sampled as u8;
                self.bit += 1;
                if halt {
                    self.active = false;
                    return ByteEvent::Halted;
                }
                let symbol = if self.bit == ACK_SLOT {
                    // Pull low to acknowledge, release to nack
                    Symbol::Drive(!self.ack)
                } else {
                    Symbol::Release
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::IoBuf;
    use serwire_hal::{I2cConfig, Level};

    fn config() -> I2cConfig {
        I2cConfig {
            divisor: 1,
            stretch_timeout: 10,
            settle_ticks: 2,
        }
    }

    #[test]
    fn test_receives_constant_low() {
        let mut bits = I2cBitTx::new(&config());
        let mut rx = I2cByteRx::new();
        let mut io = IoBuf::new();
        let ext = I2cLines {
            scl: Level::High,
            sda: Level::Low,
        };
        rx.start(true, &mut bits).unwrap();
        let mut result = None;
        for _ in 0..200 {
            io.set(bits.drive());
            match rx.tick(&mut bits, io.resolve(ext), false) {
                ByteEvent::Busy => {}
                other => {
                    result = Some(other);
                    break;
                }
            }
        }
        assert_eq!(result, Some(ByteEvent::Received(0x00)));
    }

    #[test]
    fn test_start_while_active_rejected() {
        let mut bits = I2cBitTx::new(&config());
        let mut rx = I2cByteRx::new();
        rx.start(true, &mut bits).unwrap();
        assert_eq!(rx.start(true, &mut bits), Err(ErrorKind::Busy));
    }
}
