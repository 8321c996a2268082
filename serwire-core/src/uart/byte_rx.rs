//! UART frame receive engine
//!
//! Assembles sampled bits into a data word and checks parity and every
//! stop bit. A bad stop bit is a framing error but the data is still
//! delivered.

use serwire_hal::{Parity, UartConfig};

use super::bit_rx::{RxBit, UartBitRx};
use crate::error::{ErrorKind, UnitStatus};

/// Flag in a register-encoded word: stop bit error
pub const RX_FRAMING_BIT: u32 = 1 << 16;
/// Flag in a register-encoded word: parity error
pub const RX_PARITY_BIT: u32 = 1 << 17;

/// One received word and its error flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxWord {
    pub data: u16,
    pub framing: bool,
    pub parity: bool,
}

impl RxWord {
    /// Error carried by the word; framing takes precedence
    pub fn error(&self) -> Option<ErrorKind> {
        if self.framing {
            Some(ErrorKind::Framing)
        } else if self.parity {
            Some(ErrorKind::Parity)
        } else {
            None
        }
    }

    /// Status of the word as a unit
    pub fn status(&self) -> UnitStatus {
        self.error().map_or(UnitStatus::Ok, UnitStatus::from)
    }

    /// Encoding used by the `RX_DATA` register
    pub fn to_register(&self) -> u32 {
        let mut value = self.data as u32 & 0x1FF;
        if self.framing {
            value |= RX_FRAMING_BIT;
        }
        if self.parity {
            value |= RX_PARITY_BIT;
        }
        value
    }
}

/// Frame deserializer
#[derive(Debug, Clone)]
pub struct UartByteRx {
    active: bool,
    index: u8,
    data: u16,
    parity_bit: bool,
    stop_ok: bool,
}

impl UartByteRx {
    /// Create an idle deserializer
    pub fn new() -> Self {
        Self {
            active: false,
            index: 0,
            data: 0,
            parity_bit: false,
            stop_ok: true,
        }
    }

    /// Check if a frame is being assembled
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Advance one reference tick
    ///
    /// Returns a word when its last stop bit has been sampled, or
    /// [`ErrorKind::LineFault`] when the line went unknown mid-frame.
    pub fn tick(
        &mut self,
        config: &UartConfig,
        bits: &mut UartBitRx,
        level: serwire_hal::Level,
    ) -> Option<Result<RxWord, ErrorKind>> {
        match bits.tick(level) {
            RxBit::Idle | RxBit::Glitch => None,
            RxBit::Started => {
                self.active = true;
                self.index = 0;
                self.data = 0;
                self.parity_bit = false;
                self.stop_ok = true;
                None
            }
            RxBit::Fault => {
                let was_active = self.active;
                self.active = false;
                if was_active {
                    warn!("uart: rx line unknown mid-frame");
                }
                Some(Err(ErrorKind::LineFault))
            }
            RxBit::Bit(bit) => {
                if !self.active {
                    return None;
                }
                self.take_bit(config, bits, bit)
            }
        }
    }

    fn take_bit(
        &mut self,
        config: &UartConfig,
        bits: &mut UartBitRx,
        bit: bool,
    ) -> Option<Result<RxWord, ErrorKind>> {
        let n = config.data_bits.count();
        let parity_bits = if config.parity == Parity::None { 0 } else { 1 };
        let total = n + parity_bits + config.stop_bits.count();

        if self.index < n {
            self.data |= (bit as u16) << self.index;
        } else if self.index < n + parity_bits {
            self.parity_bit = bit;
        } else if !bit {
            self.stop_ok = false;
        }
        self.index += 1;
        if self.index < total {
            return None;
        }

        self.active = false;
        bits.finish(bit);
        let parity = config
            .parity
            .bit_for(self.data)
            .map_or(false, |expected| expected != self.parity_bit);
        Some(Ok(RxWord {
            data: self.data,
            framing: !self.stop_ok,
            parity,
        }))
    }
}

impl Default for UartByteRx {
    fn default() -> Self {
        Self::new()
    }
}
