//! Reference clock divider
//!
//! Engines are stepped once per reference tick. A divider turns those
//! ticks into protocol phase ticks.

/// Divides the reference tick by a fixed count
#[derive(Debug, Clone)]
pub struct ClockDivider {
    divisor: u16,
    remaining: u16,
}

impl ClockDivider {
    /// Create a divider firing every `divisor` reference ticks
    ///
    /// A divisor of zero is treated as one.
    pub fn new(divisor: u16) -> Self {
        let divisor = divisor.max(1);
        Self {
            divisor,
            remaining: divisor,
        }
    }

    /// Current divisor
    pub fn divisor(&self) -> u16 {
        self.divisor
    }

    /// Change the divisor; takes effect from the next restart
    pub fn set_divisor(&mut self, divisor: u16) {
        self.divisor = divisor.max(1);
    }

    /// Start a fresh period of `divisor` ticks
    pub fn restart(&mut self) {
        self.remaining = self.divisor;
    }

    /// Start a period whose first output comes after `first` ticks
    ///
    /// Later periods use the full divisor. Used to phase-align to the
    /// middle of a bit.
    pub fn restart_with(&mut self, first: u16) {
        self.remaining = first.max(1);
    }

    /// Advance one reference tick
    ///
    /// Returns true when a phase tick is produced.
    pub fn tick(&mut self) -> bool {
        if self.remaining <= 1 {
            self.remaining = self.divisor;
            true
        } else {
            self.remaining -= 1;
            false
        }
    }
}
