//! UART engines
//!
//! The transmitter and receiver are independent, always-running halves,
//! each with its own clock divider and FIFO. [`Uart`] bundles them and can
//! be split so the halves are stepped from different timing domains.
//! [`regs`] exposes the pair as a word-addressed register block.

pub mod bit_rx;
pub mod bit_tx;
pub mod byte_rx;
pub mod byte_tx;
pub mod controller;
pub mod regs;

pub use byte_rx::RxWord;
pub use controller::{Uart, UartFlags, UartRxHalf, UartTxHalf, FIFO_DEPTH};
pub use regs::{Access, BusError, UartRegs, WritePolicy};
