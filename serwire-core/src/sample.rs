//! Line sampling with a settle limit
//!
//! A sampling point that sees an unknown level waits for it to resolve.
//! If it is still unknown after the settle limit the sample is a line
//! fault.

use serwire_hal::Level;

/// Result of resolving a line level at a sampling point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sample {
    /// Level resolved to a bit
    Bit(bool),
    /// Still unknown; try again next reference tick
    Pending,
    /// Unknown for longer than the settle limit
    Fault,
}

/// Tracks how long a sampling point has been waiting on an unknown level
#[derive(Debug, Clone)]
pub struct Settler {
    limit: u16,
    waited: u16,
}

impl Settler {
    /// Create a settler allowing `limit` unknown ticks
    pub fn new(limit: u16) -> Self {
        Self { limit, waited: 0 }
    }

    /// Change the settle limit
    pub fn set_limit(&mut self, limit: u16) {
        self.limit = limit;
        self.waited = 0;
    }

    /// Forget any wait in progress
    pub fn reset(&mut self) {
        self.waited = 0;
    }

    /// Resolve one observation of the line
    pub fn resolve(&mut self, level: Level) -> Sample {
        match level.to_bit() {
            Some(bit) => {
                self.waited = 0;
                Sample::Bit(bit)
            }
            None if self.waited >= self.limit => {
                self.waited = 0;
                Sample::Fault
            }
            None => {
                self.waited += 1;
                Sample::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels_pass_through() {
        let mut s = Settler::new(4);
        assert_eq!(s.resolve(Level::High), Sample::Bit(true));
        assert_eq!(s.resolve(Level::Low), Sample::Bit(false));
    }

    #[test]
    fn test_settles_within_limit() {
        let mut s = Settler::new(4);
        for _ in 0..4 {
            assert_eq!(s.resolve(Level::Unknown), Sample::Pending);
        }
        assert_eq!(s.resolve(Level::Low), Sample::Bit(false));
    }

    #[test]
    fn test_fault_after_limit() {
        let mut s = Settler::new(2);
        assert_eq!(s.resolve(Level::Unknown), Sample::Pending);
        assert_eq!(s.resolve(Level::Unknown), Sample::Pending);
        assert_eq!(s.resolve(Level::Unknown), Sample::Fault);
    }
}
