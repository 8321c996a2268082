//! SPI peripheral model
//!
//! A shift-register peripheral that follows the same mode rules as the
//! controller: it captures MOSI on capture edges and presents MISO on
//! shift edges (and at chip-select assertion in CPHA=0 modes).

use heapless::{Deque, Vec};
use serwire_hal::{BitOrder, Level, Mode};

use crate::spi::byte_rx::ShiftIn;
use crate::spi::byte_tx::ShiftOut;
use crate::spi::{SpiController, SpiOutputs};

/// Capacity of the received and response word buffers
pub const WORD_CAPACITY: usize = 64;

/// Scripted SPI peripheral
#[derive(Debug, Clone)]
pub struct SpiPeer {
    mode: Mode,
    shift_in: ShiftIn,
    shift_out: ShiftOut,
    response: Deque<u16, WORD_CAPACITY>,
    received: Vec<u16, WORD_CAPACITY>,
    miso: Level,
    prev: Option<SpiOutputs>,
    selections: u32,
}

impl SpiPeer {
    /// Create a peripheral that answers with zeros
    pub fn new(mode: Mode, bit_order: BitOrder, word_bits: u8) -> Self {
        Self {
            mode,
            shift_in: ShiftIn::new(word_bits, bit_order),
            shift_out: ShiftOut::new(word_bits, bit_order),
            response: Deque::new(),
            received: Vec::new(),
            miso: Level::Unknown,
            prev: None,
            selections: 0,
        }
    }

    /// Words shifted out on MISO, in order; zeros once exhausted
    pub fn with_response(mut self, words: &[u16]) -> Self {
        for word in words {
            let _ = self.response.push_back(*word);
        }
        self
    }

    /// Words captured from MOSI
    pub fn received(&self) -> &[u16] {
        &self.received
    }

    /// Number of chip-select assertions seen
    pub fn selections(&self) -> u32 {
        self.selections
    }

    /// Level driven on MISO; unknown while deselected
    pub fn miso(&self) -> Level {
        self.miso
    }

    /// React to one reference tick of controller outputs
    pub fn tick(&mut self, out: SpiOutputs) -> Level {
        let prev = self.prev.replace(out);
        let was_selected = prev.map_or(false, |p| p.selected());

        if !out.selected() {
            self.miso = Level::Unknown;
            self.shift_in.clear();
            self.shift_out.clear();
            return self.miso;
        }

        if !was_selected {
            self.selections += 1;
            if self.mode.captures_on_leading() {
                self.present_next();
            }
            return self.miso;
        }

        let Some(prev) = prev else {
            return self.miso;
        };
        if prev.sclk == out.sclk {
            return self.miso;
        }
        let leading = out.sclk.is_high() != self.mode.idle_high();
        if leading == self.mode.captures_on_leading() {
            if let Some(bit) = out.mosi.to_bit() {
                if let Some(word) = self.shift_in.push(bit) {
                    let _ = self.received.push(word);
                }
            }
        } else {
            self.present_next();
        }
        self.miso
    }

    fn present_next(&mut self) {
        if self.shift_out.is_empty() {
            let word = self.response.pop_front().unwrap_or(0);
            let _ = self.shift_out.load(word);
        }
        if let Some(bit) = self.shift_out.next_bit() {
            self.miso = Level::from(bit);
        }
    }
}

/// Step a controller and a peripheral through one reference tick
///
/// The controller samples the MISO level driven on the previous tick.
/// Returns the controller outputs.
pub fn step(ctrl: &mut SpiController, peer: &mut SpiPeer) -> SpiOutputs {
    let out = ctrl.tick(peer.miso());
    peer.tick(out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(sclk: bool, mosi: bool, cs: bool) -> SpiOutputs {
        SpiOutputs {
            sclk: Level::from(sclk),
            mosi: Level::from(mosi),
            cs: Level::from(cs),
        }
    }

    #[test]
    fn test_presents_first_bit_on_select() {
        let mut peer = SpiPeer::new(Mode::Mode0, BitOrder::MsbFirst, 8).with_response(&[0x80]);
        assert_eq!(peer.tick(outputs(false, false, true)), Level::Unknown);
        assert_eq!(peer.tick(outputs(false, false, false)), Level::High);
        assert_eq!(peer.selections(), 1);
    }

    #[test]
    fn test_captures_on_rising_edge_mode0() {
        let mut peer = SpiPeer::new(Mode::Mode0, BitOrder::MsbFirst, 4);
        peer.tick(outputs(false, true, true));
        peer.tick(outputs(false, true, false));
        for bit in [true, false, true, true] {
            peer.tick(outputs(false, bit, false));
            peer.tick(outputs(true, bit, false));
        }
        assert_eq!(peer.received(), &[0b1011]);
    }
}
