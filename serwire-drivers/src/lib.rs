//! Pin-level bus drivers
//!
//! Binds the tick-driven controllers from `serwire-core` to `embedded-hal`
//! digital pins, implementing the blocking bus traits of `serwire-hal`:
//!
//! - [`PinI2c`] - open-drain SCL/SDA pair
//! - [`PinSpi`] - SCLK, MOSI, MISO and chip-select
//! - [`PinUart`] - TX and RX lines
//!
//! Each driver samples its inputs, steps the controller once and writes
//! the outputs, then waits on a [`serwire_hal::TickSource`] for the next
//! reference tick. [`DelayTick`] turns any `embedded-hal` delay into such
//! a source.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod error;
pub mod i2c;
pub mod spi;
pub mod tick;
pub mod uart;

pub use error::DriverError;
pub use i2c::PinI2c;
pub use spi::PinSpi;
pub use tick::DelayTick;
pub use uart::PinUart;
