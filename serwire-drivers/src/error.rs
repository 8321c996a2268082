//! Driver error type

use serwire_core::ErrorKind;

/// Error from a pin-backed driver
///
/// `E` is the error type of the underlying pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError<E> {
    /// A pin read or write failed
    Pin(E),
    /// The protocol engine reported a failure
    Protocol(ErrorKind),
    /// Nothing arrived within the configured number of ticks
    Timeout,
}

impl<E> DriverError<E> {
    /// Protocol error kind, if this is a protocol failure
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DriverError::Protocol(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl<E> From<ErrorKind> for DriverError<E> {
    fn from(kind: ErrorKind) -> Self {
        DriverError::Protocol(kind)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for DriverError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DriverError::Pin(e) => write!(f, "pin error: {:?}", e),
            DriverError::Protocol(kind) => write!(f, "{}", kind),
            DriverError::Timeout => f.write_str("receive timeout"),
        }
    }
}
