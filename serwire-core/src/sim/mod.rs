//! Deterministic simulation peers
//!
//! Models of the parties on the other end of each bus, stepped in lock
//! step with a controller. Used by the unit tests and by hosts that want
//! to exercise a controller without hardware.

pub mod clock;
pub mod i2c;
pub mod spi;
pub mod uart;

pub use clock::VirtualClock;
