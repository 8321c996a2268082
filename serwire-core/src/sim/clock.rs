//! Virtual reference clock

use serwire_hal::TickSource;

/// Tick source that advances only when waited on
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    ticks: u64,
}

impl VirtualClock {
    /// Create a clock at tick zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump forward `count` ticks
    pub fn advance(&mut self, count: u64) {
        self.ticks = self.ticks.wrapping_add(count);
    }
}

impl TickSource for VirtualClock {
    fn wait_tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }
}
