//! Delay-backed reference clock

use embedded_hal::delay::DelayNs;
use serwire_hal::TickSource;

/// Tick source that sleeps one tick period per tick
///
/// The period should be the reference tick the controller divisors were
/// computed against. Time spent stepping the controller between waits is
/// not compensated, so the real tick is slightly longer than the period.
pub struct DelayTick<D> {
    delay: D,
    period_ns: u32,
    ticks: u64,
}

impl<D: DelayNs> DelayTick<D> {
    /// Create a tick source with a period in nanoseconds
    pub fn new(delay: D, period_ns: u32) -> Self {
        Self {
            delay,
            period_ns,
            ticks: 0,
        }
    }

    /// Create a tick source running at `hz` ticks per second
    ///
    /// Rates above 1 GHz are clamped to a 1 ns period.
    pub fn from_hz(delay: D, hz: u32) -> Self {
        let period_ns = (1_000_000_000 / hz.max(1)).max(1);
        Self::new(delay, period_ns)
    }

    /// Tick period in nanoseconds
    pub fn period_ns(&self) -> u32 {
        self.period_ns
    }

    /// Release the delay
    pub fn free(self) -> D {
        self.delay
    }
}

impl<D: DelayNs> TickSource for DelayTick<D> {
    fn wait_tick(&mut self) {
        self.delay.delay_ns(self.period_ns);
        self.ticks = self.ticks.wrapping_add(1);
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Delay that only adds up requested time
    #[derive(Default)]
    struct MockDelay {
        total_ns: u64,
    }

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    #[test]
    fn test_waits_one_period_per_tick() {
        let mut tick = DelayTick::new(MockDelay::default(), 250);
        for _ in 0..4 {
            tick.wait_tick();
        }
        assert_eq!(tick.ticks(), 4);
        assert_eq!(tick.free().total_ns, 1_000);
    }

    #[test]
    fn test_period_from_hz() {
        assert_eq!(DelayTick::from_hz(MockDelay::default(), 1_000_000).period_ns(), 1_000);
        assert_eq!(DelayTick::from_hz(MockDelay::default(), 0).period_ns(), 1_000_000_000);
        assert_eq!(DelayTick::from_hz(MockDelay::default(), u32::MAX).period_ns(), 1);
    }
}
