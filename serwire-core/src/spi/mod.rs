//! SPI controller-mode engines
//!
//! One SCLK generator and one chip-select are shared by the transmit and
//! receive shift registers. Mode 0-3, bit order and word size are
//! configuration, not runtime state.

pub mod bit_rx;
pub mod bit_tx;
pub mod byte_rx;
pub mod byte_tx;
pub mod clock;
pub mod controller;

pub use controller::{SpiController, SpiState};

use serwire_hal::Level;

/// Levels driven by the controller
///
/// Chip-select is active low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiOutputs {
    pub sclk: Level,
    pub mosi: Level,
    pub cs: Level,
}

impl SpiOutputs {
    /// Check if chip-select is asserted
    pub fn selected(&self) -> bool {
        self.cs.is_low()
    }
}
