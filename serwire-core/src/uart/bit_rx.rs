//! UART bit receive engine
//!
//! Hunts for the falling edge of a start bit, confirms it half a bit
//! later and then samples each following bit at its centre. A start bit
//! that is no longer low at its centre is rejected as a glitch.

use serwire_hal::Level;

use crate::clock::ClockDivider;
use crate::sample::{Sample, Settler};

/// Outcome of one reference tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxBit {
    /// Nothing to report
    Idle,
    /// Start bit confirmed at its centre
    Started,
    /// Bit sampled at its centre
    Bit(bool),
    /// Falling edge was too short to be a start bit
    Glitch,
    /// Line unknown past the settle limit at a sample point
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Hunting,
    Confirming,
    Sampling,
}

/// RX line sampler
#[derive(Debug, Clone)]
pub struct UartBitRx {
    state: State,
    divider: ClockDivider,
    settler: Settler,
    /// Last known level while hunting
    prev: Option<bool>,
    due: bool,
}

impl UartBitRx {
    /// Create a sampler hunting for a start bit
    pub fn new(divisor: u16, settle_ticks: u16) -> Self {
        Self {
            state: State::Hunting,
            divider: ClockDivider::new(divisor),
            settler: Settler::new(settle_ticks),
            prev: None,
            due: false,
        }
    }

    /// Apply new timing; only call while hunting
    pub fn configure(&mut self, divisor: u16, settle_ticks: u16) {
        self.divider.set_divisor(divisor);
        self.settler.set_limit(settle_ticks);
    }

    /// Check if a frame is being received
    pub fn is_active(&self) -> bool {
        self.state != State::Hunting
    }

    /// Frame complete; hunt for the next start bit
    ///
    /// `last` is the level of the final stop bit, so a stop bit that was
    /// low does not immediately look like the next start.
    pub fn finish(&mut self, last: bool) {
        self.state = State::Hunting;
        self.prev = Some(last);
        self.due = false;
    }

    /// Drop any frame in progress
    pub fn reset(&mut self) {
        self.state = State::Hunting;
        self.prev = None;
        self.due = false;
        self.settler.reset();
    }

    /// Advance one reference tick with the observed RX level
    pub fn tick(&mut self, level: Level) -> RxBit {
        match self.state {
            State::Hunting => {
                let Some(bit) = level.to_bit() else {
                    return RxBit::Idle;
                };
                if self.prev == Some(true) && !bit {
                    // Centre of the start bit is half a period away
                    self.divider.restart_with(self.divider.divisor() / 2);
                    self.due = false;
                    self.state = State::Confirming;
                }
                self.prev = Some(bit);
                RxBit::Idle
            }
            State::Confirming => match self.sample(level) {
                None => RxBit::Idle,
                Some(Sample::Bit(false)) => {
                    self.state = State::Sampling;
                    RxBit::Started
                }
                Some(Sample::Bit(true)) => {
                    trace!("uart: start bit glitch rejected");
                    self.state = State::Hunting;
                    self.prev = Some(true);
                    RxBit::Glitch
                }
                Some(Sample::Pending) => RxBit::Idle,
                Some(Sample::Fault) => {
                    self.reset();
                    RxBit::Fault
                }
            },
            State::Sampling => match self.sample(level) {
                Some(Sample::Bit(bit)) => RxBit::Bit(bit),
                None | Some(Sample::Pending) => RxBit::Idle,
                Some(Sample::Fault) => {
                    self.reset();
                    RxBit::Fault
                }
            },
        }
    }

    /// Sample at a due sample point; `None` between sample points
    fn sample(&mut self, level: Level) -> Option<Sample> {
        if !self.due {
            self.due = self.divider.tick();
        }
        if !self.due {
            return None;
        }
        let sample = self.settler.resolve(level);
        if sample != Sample::Pending {
            self.due = false;
        }
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(rx: &mut UartBitRx, level: Level, ticks: usize) -> heapless::Vec<RxBit, 64> {
        let mut events = heapless::Vec::new();
        for _ in 0..ticks {
            let event = rx.tick(level);
            if event != RxBit::Idle {
                let _ = events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_start_confirmed_at_centre() {
        let mut rx = UartBitRx::new(8, 4);
        feed(&mut rx, Level::High, 3);
        let events = feed(&mut rx, Level::Low, 8);
        assert_eq!(&events[..], &[RxBit::Started]);
        assert!(rx.is_active());
    }

    #[test]
    fn test_glitch_rejected() {
        let mut rx = UartBitRx::new(8, 4);
        feed(&mut rx, Level::High, 3);
        feed(&mut rx, Level::Low, 2);
        let events = feed(&mut rx, Level::High, 8);
        assert_eq!(&events[..], &[RxBit::Glitch]);
        assert!(!rx.is_active());
    }

    #[test]
    fn test_line_low_from_reset_is_not_a_start() {
        let mut rx = UartBitRx::new(8, 4);
        let events = feed(&mut rx, Level::Low, 20);
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_at_sample_point_faults() {
        let mut rx = UartBitRx::new(8, 2);
        feed(&mut rx, Level::High, 2);
        feed(&mut rx, Level::Low, 5);
        let events = feed(&mut rx, Level::Unknown, 20);
        assert_eq!(&events[..], &[RxBit::Fault]);
    }
}
