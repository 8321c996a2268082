//! Serwire Hardware Abstraction Layer
//!
//! This crate defines the plain types and traits shared by the protocol
//! engines in `serwire-core` and the pin-backed drivers in
//! `serwire-drivers`. Nothing here performs protocol timing; it only
//! describes wires, ticks, configuration and the blocking host bus surface.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Host application                       │
//! └─────────────────────────────────────────┘
//!                     │  I2cBus / SpiBus / UartTx / UartRx
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  serwire-drivers (pins + delay tick)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  serwire-core (bit/byte engines)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  serwire-hal (this crate - types)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`tick::TickSource`] - Reference clock ticks (virtual or timed)
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial communication
//! - [`i2c::I2cBus`] - I2C bus operations
//! - [`spi::SpiBus`] - SPI bus operations
//! - [`storage::ConfigStorage`] - Persistent configuration storage

#![no_std]
#![deny(unsafe_code)]

pub mod error;
pub mod i2c;
pub mod line;
pub mod spi;
pub mod storage;
pub mod tick;
pub mod uart;

// Re-export key types at crate root for convenience
pub use error::ConfigError;
pub use i2c::{Address, I2cBus, I2cConfig};
pub use line::{Drive, Level};
pub use spi::{BitOrder, Mode, SpiBus, SpiConfig};
pub use storage::{ConfigStorage, StorageError, StorageKey};
pub use tick::TickSource;
pub use uart::{DataBits, Parity, StopBits, UartConfig, UartRx, UartTx};
