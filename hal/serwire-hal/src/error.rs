//! Configuration errors

/// Errors from validating a protocol configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Clock divisor is below the protocol minimum
    DivisorTooSmall,
    /// Requested rate cannot be derived from the reference clock
    RateOutOfRange,
    /// Word size outside the supported range
    InvalidWordSize,
    /// Address outside the 7-bit or 10-bit range, or reserved
    InvalidAddress,
    /// Stretch timeout of zero would fail every transfer
    InvalidTimeout,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ConfigError::DivisorTooSmall => "clock divisor too small",
            ConfigError::RateOutOfRange => "rate not reachable from reference clock",
            ConfigError::InvalidWordSize => "unsupported word size",
            ConfigError::InvalidAddress => "invalid bus address",
            ConfigError::InvalidTimeout => "invalid timeout",
        };
        f.write_str(msg)
    }
}

/// Derive a divisor from a reference clock and a target rate
///
/// Rounds to the nearest integer divisor.
pub(crate) fn divisor_for(reference_hz: u32, rate_hz: u32, per_rate: u32) -> Result<u16, ConfigError> {
    if rate_hz == 0 || per_rate == 0 {
        return Err(ConfigError::RateOutOfRange);
    }
    let denom = rate_hz as u64 * per_rate as u64;
    let div = (reference_hz as u64 + denom / 2) / denom;
    if div == 0 || div > u16::MAX as u64 {
        return Err(ConfigError::RateOutOfRange);
    }
    Ok(div as u16)
}
