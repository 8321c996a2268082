//! SPI bit transmit engine
//!
//! Drives MOSI. New bits are presented only on shift edges, the edges
//! complementary to the capture edge, so the peripheral always captures
//! a stable level.

use serwire_hal::{Level, Mode};

use super::clock::Edge;

/// MOSI driver
#[derive(Debug, Clone)]
pub struct SpiBitTx {
    shift_on_leading: bool,
    level: Level,
}

impl SpiBitTx {
    /// Create a driver holding MOSI low
    pub fn new(mode: Mode) -> Self {
        Self {
            shift_on_leading: !mode.captures_on_leading(),
            level: Level::Low,
        }
    }

    /// Apply a new mode
    pub fn configure(&mut self, mode: Mode) {
        self.shift_on_leading = !mode.captures_on_leading();
    }

    /// Check if `edge` is a shift edge in this mode
    pub fn is_shift_edge(&self, edge: Edge) -> bool {
        (edge == Edge::Leading) == self.shift_on_leading
    }

    /// Present a bit on MOSI
    pub fn present(&mut self, bit: bool) {
        self.level = Level::from(bit);
    }

    /// Current MOSI level
    pub fn level(&self) -> Level {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_edges_per_mode() {
        let mode0 = SpiBitTx::new(Mode::Mode0);
        assert!(mode0.is_shift_edge(Edge::Trailing));
        assert!(!mode0.is_shift_edge(Edge::Leading));

        let mode1 = SpiBitTx::new(Mode::Mode1);
        assert!(mode1.is_shift_edge(Edge::Leading));
    }
}
