//! UART bit transmit engine
//!
//! Holds the TX line at one level for a full bit period.

use serwire_hal::Level;

use crate::clock::ClockDivider;

/// TX line driver
#[derive(Debug, Clone)]
pub struct UartBitTx {
    divider: ClockDivider,
    level: Level,
    active: bool,
}

impl UartBitTx {
    /// Create an idle driver (line high)
    pub fn new(divisor: u16) -> Self {
        Self {
            divider: ClockDivider::new(divisor),
            level: Level::High,
            active: false,
        }
    }

    /// Change the bit period; only call while idle
    pub fn set_divisor(&mut self, divisor: u16) {
        self.divider.set_divisor(divisor);
    }

    /// Start driving a bit; the period begins on this tick
    pub fn send(&mut self, bit: bool) {
        self.level = Level::from(bit);
        self.active = true;
        self.divider.restart();
    }

    /// Return the line to idle
    pub fn idle(&mut self) {
        self.level = Level::High;
        self.active = false;
    }

    /// Check if a bit is being driven
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current TX level
    pub fn level(&self) -> Level {
        self.level
    }

    /// Advance one reference tick
    ///
    /// Returns true when the current bit period has ended.
    pub fn tick(&mut self) -> bool {
        if !self.active {
            return false;
        }
        if self.divider.tick() {
            self.active = false;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_lasts_divisor_ticks() {
        let mut tx = UartBitTx::new(4);
        tx.send(false);
        assert_eq!(tx.level(), Level::Low);
        assert!(!tx.tick());
        assert!(!tx.tick());
        assert!(!tx.tick());
        assert!(tx.tick());
        assert!(!tx.is_active());
    }
}
