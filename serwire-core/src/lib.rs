//! Tick-driven serial protocol engines
//!
//! This crate contains the protocol logic for I2C, SPI and UART
//! controllers, independent of any pins or timers:
//!
//! - Clock dividers and line sampling with a settle limit
//! - Bit-level and byte-level transmit and receive engines
//! - Top controllers implementing [`transfer::TransferController`]
//! - A register block view of the UART
//! - Simulation peers for exercising controllers without hardware
//! - Persisted configuration records (`serde` feature)
//!
//! Every engine is advanced by an explicit `tick` call, once per
//! reference clock tick. Nothing blocks and nothing allocates.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod clock;
pub mod error;
pub mod i2c;
pub mod sample;
pub mod sim;
pub mod spi;
pub mod transfer;
pub mod uart;

#[cfg(feature = "serde")]
pub mod config;

pub use error::{ErrorKind, UnitStatus};
pub use transfer::{BusyPolicy, Direction, TransferController, TransferHandle, TransferStatus};
