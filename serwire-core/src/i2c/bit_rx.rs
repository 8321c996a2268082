//! I2C bit receive engine
//!
//! Samples SDA and SCL through a settle limit and watches for START and
//! STOP conditions (SDA edges while SCL is high) asynchronously to the
//! bit clock.

use super::I2cLines;
use crate::sample::{Sample, Settler};

/// Bus condition seen on SDA while SCL is high
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Condition {
    /// SDA fell while SCL was high
    Start,
    /// SDA rose while SCL was high
    Stop,
}

/// I2C line sampler
#[derive(Debug, Clone)]
pub struct I2cBitRx {
    prev: I2cLines,
    scl: Settler,
    sda: Settler,
}

impl I2cBitRx {
    /// Create a sampler with the given settle limit (reference ticks)
    pub fn new(settle_ticks: u16) -> Self {
        Self {
            prev: I2cLines::IDLE,
            scl: Settler::new(settle_ticks),
            sda: Settler::new(settle_ticks),
        }
    }

    /// Change the settle limit
    pub fn set_settle(&mut self, settle_ticks: u16) {
        self.scl.set_limit(settle_ticks);
        self.sda.set_limit(settle_ticks);
    }

    /// Forget edge history and any pending settle wait
    pub fn reset(&mut self, lines: I2cLines) {
        self.prev = lines;
        self.scl.reset();
        self.sda.reset();
    }

    /// Record one observation and report a START/STOP condition
    ///
    /// Must be called on every reference tick so edges are not missed.
    pub fn observe(&mut self, lines: I2cLines) -> Option<Condition> {
        let scl_high = self.prev.scl.is_high() && lines.scl.is_high();
        let condition = if !scl_high {
            None
        } else if self.prev.sda.is_high() && lines.sda.is_low() {
            Some(Condition::Start)
        } else if self.prev.sda.is_low() && lines.sda.is_high() {
            Some(Condition::Stop)
        } else {
            None
        };
        self.prev = lines;
        condition
    }

    /// Sample SDA
    pub fn sample_sda(&mut self, lines: I2cLines) -> Sample {
        self.sda.resolve(lines.sda)
    }

    /// Sample SCL
    pub fn sample_scl(&mut self, lines: I2cLines) -> Sample {
        self.scl.resolve(lines.scl)
    }
}
