//! SCLK generator
//!
//! Toggles SCLK every `divisor` reference ticks while running. Each toggle
//! is either the leading edge (idle to active level) or the trailing
//! edge of a clock cycle.

use serwire_hal::{Level, Mode};

use crate::clock::ClockDivider;

/// Kind of SCLK transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Idle level to active level
    Leading,
    /// Active level back to idle level
    Trailing,
}

/// SPI serial clock generator
#[derive(Debug, Clone)]
pub struct SclkGen {
    divider: ClockDivider,
    idle_high: bool,
    active: bool,
    due: bool,
}

impl SclkGen {
    /// Create a generator resting at the mode's idle level
    pub fn new(divisor: u16, mode: Mode) -> Self {
        Self {
            divider: ClockDivider::new(divisor),
            idle_high: mode.idle_high(),
            active: false,
            due: false,
        }
    }

    /// Apply new timing and polarity; forces the idle level
    pub fn configure(&mut self, divisor: u16, mode: Mode) {
        self.divider.set_divisor(divisor);
        self.idle_high = mode.idle_high();
        self.active = false;
    }

    /// Start a fresh half period
    pub fn restart(&mut self) {
        self.due = false;
        self.divider.restart();
    }

    /// Return to the idle level
    pub fn idle(&mut self) {
        self.active = false;
        self.due = false;
    }

    /// Check if the current half period has elapsed
    ///
    /// Stays true until the next [`toggle`](Self::toggle), so an edge can
    /// be held back while a sample settles.
    pub fn due(&mut self) -> bool {
        if !self.due {
            self.due = self.divider.tick();
        }
        self.due
    }

    /// Edge the next toggle will produce
    pub fn next_edge(&self) -> Edge {
        if self.active {
            Edge::Trailing
        } else {
            Edge::Leading
        }
    }

    /// Produce the next edge and start a new half period
    pub fn toggle(&mut self) -> Edge {
        let edge = self.next_edge();
        self.active = !self.active;
        self.restart();
        edge
    }

    /// Current SCLK level
    pub fn level(&self) -> Level {
        Level::from(self.active != self.idle_high)
    }
}
