//! Protocol error model
//!
//! Every engine reports faults upward as an [`ErrorKind`]; nothing retries
//! locally and nothing is fatal.

/// Reason a unit or transfer did not complete normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// A sampled line stayed unknown past the settle limit
    LineFault,
    /// UART stop bit was not high
    Framing,
    /// UART parity bit mismatch
    Parity,
    /// I2C target did not acknowledge
    Nack,
    /// I2C contention or a foreign START/STOP during a frame
    BusFault,
    /// I2C clock held low past the stretch timeout
    Timeout,
    /// Receive FIFO full; the incoming word was dropped
    Overrun,
    /// Controller already has a transfer in flight
    Busy,
    /// Transfer was aborted by the host
    Aborted,
    /// Request larger than the transfer buffer
    TooLong,
    /// Direction or shape not meaningful for the protocol
    Unsupported,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ErrorKind::LineFault => "line did not settle",
            ErrorKind::Framing => "framing error",
            ErrorKind::Parity => "parity error",
            ErrorKind::Nack => "not acknowledged",
            ErrorKind::BusFault => "bus fault",
            ErrorKind::Timeout => "clock stretch timeout",
            ErrorKind::Overrun => "receive overrun",
            ErrorKind::Busy => "controller busy",
            ErrorKind::Aborted => "transfer aborted",
            ErrorKind::TooLong => "request exceeds transfer buffer",
            ErrorKind::Unsupported => "unsupported request",
        };
        f.write_str(msg)
    }
}

/// Outcome of the most recently completed unit (byte, word or frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnitStatus {
    /// Unit completed without error
    Ok,
    /// Transmitted I2C byte was acknowledged
    Ack,
    /// Transmitted I2C byte was not acknowledged
    Nack,
    /// Unit failed
    Error(ErrorKind),
}

impl From<ErrorKind> for UnitStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Nack => UnitStatus::Nack,
            other => UnitStatus::Error(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nack_maps_to_nack_status() {
        assert_eq!(UnitStatus::from(ErrorKind::Nack), UnitStatus::Nack);
        assert_eq!(
            UnitStatus::from(ErrorKind::Framing),
            UnitStatus::Error(ErrorKind::Framing)
        );
    }
}
