//! Wire line abstractions
//!
//! Lines are modelled as logic levels rather than pins so the same engines
//! can be fed from a simulation or from sampled GPIO inputs.

/// Logic level observed on a wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Logic 0
    Low,
    /// Logic 1 (also the pulled-up idle level)
    #[default]
    High,
    /// Undriven or indeterminate
    Unknown,
}

impl Level {
    /// Check if the level is a valid logic 1
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// Check if the level is a valid logic 0
    pub fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }

    /// Check if the level resolved to a valid logic value
    pub fn is_known(self) -> bool {
        !matches!(self, Level::Unknown)
    }

    /// Convert to a bit, if the level is known
    pub fn to_bit(self) -> Option<bool> {
        match self {
            Level::Low => Some(false),
            Level::High => Some(true),
            Level::Unknown => None,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Open-drain output intent
///
/// An open-drain driver may only pull its line low or let go of it;
/// the pull-up supplies the high level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Drive {
    /// Actively pull the line low
    Low,
    /// Float the line and let the pull-up (or another party) decide
    #[default]
    Release,
}

impl Drive {
    /// Level this driver contributes on its own (pull-up assumed)
    pub fn level(self) -> Level {
        match self {
            Drive::Low => Level::Low,
            Drive::Release => Level::High,
        }
    }

    /// Check if the line is released
    pub fn is_released(self) -> bool {
        matches!(self, Drive::Release)
    }
}

/// Resolve a shared open-drain line
///
/// Every party either pulls low or releases. Any low wins; if everyone
/// releases the pull-up yields high. An unknown contribution only shows
/// through when nobody pulls low.
pub fn wired_and<I: IntoIterator<Item = Level>>(levels: I) -> Level {
    let mut resolved = Level::High;
    for level in levels {
        match level {
            Level::Low => return Level::Low,
            Level::Unknown => resolved = Level::Unknown,
            Level::High => {}
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert_eq!(Level::Unknown.to_bit(), None);
        assert_eq!(Level::Low.to_bit(), Some(false));
    }

    #[test]
    fn test_wired_and_any_low_wins() {
        assert_eq!(wired_and([Level::High, Level::Low]), Level::Low);
        assert_eq!(wired_and([Level::Unknown, Level::Low]), Level::Low);
        assert_eq!(wired_and([Level::High, Level::High]), Level::High);
        assert_eq!(wired_and([Level::High, Level::Unknown]), Level::Unknown);
        assert_eq!(wired_and(core::iter::empty()), Level::High); // pull-up only
    }

    #[test]
    fn test_drive_level() {
        assert_eq!(Drive::Low.level(), Level::Low);
        assert_eq!(Drive::Release.level(), Level::High);
        assert!(Drive::default().is_released());
    }
}
