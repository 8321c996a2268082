//! SPI word transmit engine
//!
//! Shift register feeding MOSI, MSB or LSB first.

use serwire_hal::BitOrder;

use crate::error::ErrorKind;

/// Outgoing shift register
#[derive(Debug, Clone)]
pub struct ShiftOut {
    word: u16,
    bits: u8,
    remaining: u8,
    order: BitOrder,
}

impl ShiftOut {
    /// Create an empty register for `bits`-wide words
    pub fn new(bits: u8, order: BitOrder) -> Self {
        Self {
            word: 0,
            bits,
            remaining: 0,
            order,
        }
    }

    /// Apply a new word size and order
    pub fn configure(&mut self, bits: u8, order: BitOrder) {
        self.bits = bits;
        self.order = order;
        self.remaining = 0;
    }

    /// Check if every bit of the loaded word has been shifted out
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Load a word
    ///
    /// Rejected with [`ErrorKind::Busy`] while a word is still shifting.
    pub fn load(&mut self, word: u16) -> Result<(), ErrorKind> {
        if !self.is_empty() {
            return Err(ErrorKind::Busy);
        }
        self.word = word;
        self.remaining = self.bits;
        Ok(())
    }

    /// Drop the word in progress
    pub fn clear(&mut self) {
        self.remaining = 0;
    }

    /// Take the next bit
    pub fn next_bit(&mut self) -> Option<bool> {
        if self.remaining == 0 {
            return None;
        }
        let index = match self.order {
            BitOrder::MsbFirst => self.remaining - 1,
            BitOrder::LsbFirst => self.bits - self.remaining,
        };
        self.remaining -= 1;
        Some((self.word >> index) & 1 != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first() {
        let mut sr = ShiftOut::new(8, BitOrder::MsbFirst);
        sr.load(0xA5).unwrap();
        let bits: heapless::Vec<bool, 8> = core::iter::from_fn(|| sr.next_bit()).collect();
        assert_eq!(
            &bits[..],
            &[true, false, true, false, false, true, false, true]
        );
        assert!(sr.is_empty());
    }

    #[test]
    fn test_lsb_first_twelve_bits() {
        let mut sr = ShiftOut::new(12, BitOrder::LsbFirst);
        sr.load(0x801).unwrap();
        assert_eq!(sr.next_bit(), Some(true));
        for _ in 0..10 {
            assert_eq!(sr.next_bit(), Some(false));
        }
        assert_eq!(sr.next_bit(), Some(true));
        assert_eq!(sr.next_bit(), None);
    }

    #[test]
    fn test_load_while_shifting_rejected() {
        let mut sr = ShiftOut::new(8, BitOrder::MsbFirst);
        sr.load(0x01).unwrap();
        sr.next_bit();
        assert_eq!(sr.load(0x02), Err(ErrorKind::Busy));
    }
}
