//! SPI word receive engine
//!
//! Shift register assembling MISO captures into words.

use serwire_hal::BitOrder;

/// Incoming shift register
#[derive(Debug, Clone)]
pub struct ShiftIn {
    acc: u16,
    count: u8,
    bits: u8,
    order: BitOrder,
}

impl ShiftIn {
    /// Create an empty register for `bits`-wide words
    pub fn new(bits: u8, order: BitOrder) -> Self {
        Self {
            acc: 0,
            count: 0,
            bits,
            order,
        }
    }

    /// Apply a new word size and order
    pub fn configure(&mut self, bits: u8, order: BitOrder) {
        self.bits = bits;
        self.order = order;
        self.clear();
    }

    /// Drop a partial word
    pub fn clear(&mut self) {
        self.acc = 0;
        self.count = 0;
    }

    /// Shift in one captured bit; returns the word once complete
    pub fn push(&mut self, bit: bool) -> Option<u16> {
        match self.order {
            BitOrder::MsbFirst => self.acc = (self.acc << 1) | bit as u16,
            BitOrder::LsbFirst => self.acc |= (bit as u16) << self.count,
        }
        self.count += 1;
        if self.count < self.bits {
            return None;
        }
        let word = self.acc;
        self.clear();
        Some(word)
    }
}
