//! SPI bit receive engine
//!
//! Samples MISO on the capture edge selected by the mode, through the
//! settle limit.

use serwire_hal::{Level, Mode};

use super::clock::Edge;
use crate::sample::{Sample, Settler};

/// MISO sampler
#[derive(Debug, Clone)]
pub struct SpiBitRx {
    capture_on_leading: bool,
    settler: Settler,
}

impl SpiBitRx {
    /// Create a sampler for `mode`
    pub fn new(mode: Mode, settle_ticks: u16) -> Self {
        Self {
            capture_on_leading: mode.captures_on_leading(),
            settler: Settler::new(settle_ticks),
        }
    }

    /// Apply a new mode and settle limit
    pub fn configure(&mut self, mode: Mode, settle_ticks: u16) {
        self.capture_on_leading = mode.captures_on_leading();
        self.settler.set_limit(settle_ticks);
    }

    /// Check if `edge` is a capture edge in this mode
    pub fn is_capture_edge(&self, edge: Edge) -> bool {
        (edge == Edge::Leading) == self.capture_on_leading
    }

    /// Sample MISO just before a capture edge
    pub fn sample(&mut self, miso: Level) -> Sample {
        self.settler.resolve(miso)
    }

    /// Forget any pending settle wait
    pub fn reset(&mut self) {
        self.settler.reset();
    }
}
