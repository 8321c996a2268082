//! UART line waveforms
//!
//! Produces the RX level for every reference tick of a frame, with
//! optional corruption, for feeding a receiver directly.

use heapless::Vec;
use serwire_hal::{Level, UartConfig};

/// Longest frame: start, 9 data, parity, 2 stop
const MAX_FRAME_BITS: usize = 13;

/// Tick-by-tick levels of one frame
///
/// One bit period of idle line precedes and follows the frame.
#[derive(Debug, Clone)]
pub struct FrameWave {
    bits: Vec<Level, MAX_FRAME_BITS>,
    parity_index: Option<usize>,
    stop_index: usize,
    divisor: u32,
    tick: u32,
}

impl FrameWave {
    /// Waveform of `word` framed per `config`
    pub fn new(config: &UartConfig, word: u16) -> Self {
        let data = word & config.data_mask();
        let mut bits = Vec::new();
        let _ = bits.push(Level::Low);
        for i in 0..config.data_bits.count() {
            let _ = bits.push(Level::from((data >> i) & 1 != 0));
        }
        let parity_index = config.parity.bit_for(data).map(|bit| {
            let _ = bits.push(Level::from(bit));
            bits.len() - 1
        });
        let stop_index = bits.len();
        for _ in 0..config.stop_bits.count() {
            let _ = bits.push(Level::High);
        }
        Self {
            bits,
            parity_index,
            stop_index,
            divisor: config.divisor as u32,
            tick: 0,
        }
    }

    /// Drive every stop bit at `level`
    pub fn with_stop_level(mut self, level: Level) -> Self {
        for bit in self.bits[self.stop_index..].iter_mut() {
            *bit = level;
        }
        self
    }

    /// Invert the parity bit
    pub fn with_flipped_parity(mut self) -> Self {
        if let Some(i) = self.parity_index {
            self.bits[i] = match self.bits[i] {
                Level::Low => Level::High,
                _ => Level::Low,
            };
        }
        self
    }

    /// Total ticks in the waveform, idle periods included
    pub fn len_ticks(&self) -> u32 {
        (self.bits.len() as u32 + 2) * self.divisor
    }
}

impl Iterator for FrameWave {
    type Item = Level;

    fn next(&mut self) -> Option<Level> {
        if self.tick >= self.len_ticks() {
            return None;
        }
        let period = (self.tick / self.divisor) as usize;
        self.tick += 1;
        if period == 0 || period > self.bits.len() {
            Some(Level::High)
        } else {
            Some(self.bits[period - 1])
        }
    }
}

/// A low pulse of `width` ticks on an idle line
///
/// Shorter than half a bit, it must be rejected as a start bit.
pub fn glitch(width: u32, idle: u32) -> impl Iterator<Item = Level> {
    (0..idle + width + idle).map(move |t| {
        if t >= idle && t < idle + width {
            Level::Low
        } else {
            Level::High
        }
    })
}
