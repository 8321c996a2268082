//! UART top controller
//!
//! Two independent halves share only the frame format. Each has its own
//! divider and FIFO and may be stepped from its own timing domain after
//! [`Uart::split`]. Host transfers queue bytes into the TX FIFO and
//! collect bytes from the RX FIFO.

use bitflags::bitflags;
use heapless::Deque;
use serwire_hal::{Level, UartConfig};

use super::bit_rx::UartBitRx;
use super::bit_tx::UartBitTx;
use super::byte_rx::{RxWord, UartByteRx};
use super::byte_tx::UartByteTx;
use crate::error::{ErrorKind, UnitStatus};
use crate::transfer::{
    Buffer, BusyPolicy, Direction, TransferBook, TransferController, TransferHandle,
    TransferStatus,
};

/// Default TX and RX FIFO depth
pub const FIFO_DEPTH: usize = 16;

bitflags! {
    /// UART status bits, as read from the `STATUS` register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct UartFlags: u32 {
        /// A frame is on the TX line or waiting in the FIFO
        const TX_BUSY = 1 << 0;
        /// RX FIFO holds at least one word
        const RX_AVAILABLE = 1 << 1;
        /// A received word had a bad stop bit
        const FRAMING_ERR = 1 << 2;
        /// A received word had a bad parity bit
        const PARITY_ERR = 1 << 3;
        /// A word arrived while the RX FIFO was full and was dropped
        const OVERRUN = 1 << 4;
        /// `RX_DATA` was read while the RX FIFO was empty
        const UNDERRUN = 1 << 5;
        /// TX FIFO cannot take another word
        const TX_FULL = 1 << 6;
        /// RX line stayed unknown at a sample point
        const LINE_FAULT = 1 << 7;

        /// Flags cleared by reading `STATUS`
        const STICKY = Self::FRAMING_ERR.bits()
            | Self::PARITY_ERR.bits()
            | Self::OVERRUN.bits()
            | Self::UNDERRUN.bits()
            | Self::LINE_FAULT.bits();
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UartFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "UartFlags({=u32:#x})", self.bits())
    }
}

/// Transmit half
#[derive(Debug)]
pub struct UartTxHalf<const N: usize = FIFO_DEPTH> {
    config: UartConfig,
    bits: UartBitTx,
    frame: UartByteTx,
    fifo: Deque<u16, N>,
    sent: u32,
}

impl<const N: usize> UartTxHalf<N> {
    /// Create an idle transmitter
    pub fn new(config: UartConfig) -> Self {
        Self {
            bits: UartBitTx::new(config.divisor),
            config,
            frame: UartByteTx::new(),
            fifo: Deque::new(),
            sent: 0,
        }
    }

    /// Apply a new frame format
    ///
    /// Rejected with [`ErrorKind::Busy`] while anything is left to send.
    pub fn configure(&mut self, config: UartConfig) -> Result<(), ErrorKind> {
        if self.is_busy() {
            return Err(ErrorKind::Busy);
        }
        self.bits.set_divisor(config.divisor);
        self.config = config;
        Ok(())
    }

    /// Queue a word
    ///
    /// Bits above the configured data width are ignored. Rejected with
    /// [`ErrorKind::Busy`] when the FIFO is full.
    pub fn write(&mut self, word: u16) -> Result<(), ErrorKind> {
        self.fifo
            .push_back(word & self.config.data_mask())
            .map_err(|_| ErrorKind::Busy)
    }

    /// Check if a frame is on the line or queued
    pub fn is_busy(&self) -> bool {
        self.frame.is_active() || !self.fifo.is_empty()
    }

    /// Check if the FIFO is full
    pub fn is_full(&self) -> bool {
        self.fifo.is_full()
    }

    /// Frames completed since creation
    pub fn frames_sent(&self) -> u32 {
        self.sent
    }

    /// Discard queued words; a frame already on the line is completed
    pub fn abort(&mut self) {
        self.fifo.clear();
    }

    /// Current TX level
    pub fn level(&self) -> Level {
        self.bits.level()
    }

    /// Advance one reference tick; returns the TX level
    pub fn tick(&mut self) -> Level {
        if self.frame.is_active() {
            if self.frame.tick(&mut self.bits) {
                self.sent = self.sent.wrapping_add(1);
            }
        }
        if !self.frame.is_active() {
            if let Some(word) = self.fifo.pop_front() {
                trace!("uart: tx {=u16:#x}", word);
                // Frame engine is idle here
                let _ = self.frame.load(word, &self.config, &mut self.bits);
            }
        }
        self.bits.level()
    }
}

/// Receive half
#[derive(Debug)]
pub struct UartRxHalf<const N: usize = FIFO_DEPTH> {
    config: UartConfig,
    bits: UartBitRx,
    frame: UartByteRx,
    fifo: Deque<RxWord, N>,
    sticky: UartFlags,
    overruns: u32,
    line_faults: u32,
    unit: Option<UnitStatus>,
}

impl<const N: usize> UartRxHalf<N> {
    /// Create a receiver hunting for a start bit
    pub fn new(config: UartConfig) -> Self {
        Self {
            bits: UartBitRx::new(config.divisor, config.settle_ticks),
            config,
            frame: UartByteRx::new(),
            fifo: Deque::new(),
            sticky: UartFlags::empty(),
            overruns: 0,
            line_faults: 0,
            unit: None,
        }
    }

    /// Apply a new frame format
    ///
    /// Rejected with [`ErrorKind::Busy`] while a frame is being received.
    pub fn configure(&mut self, config: UartConfig) -> Result<(), ErrorKind> {
        if self.is_busy() {
            return Err(ErrorKind::Busy);
        }
        self.bits.configure(config.divisor, config.settle_ticks);
        self.config = config;
        Ok(())
    }

    /// Check if a frame is being received
    pub fn is_busy(&self) -> bool {
        self.bits.is_active()
    }

    /// Take the oldest received word
    pub fn read(&mut self) -> Option<RxWord> {
        self.fifo.pop_front()
    }

    /// Number of words waiting
    pub fn available(&self) -> usize {
        self.fifo.len()
    }

    /// Words dropped because the FIFO was full
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Frames lost to a line that did not settle
    pub fn line_faults(&self) -> u32 {
        self.line_faults
    }

    /// Outcome of the most recently received word
    pub fn unit_status(&self) -> Option<UnitStatus> {
        self.unit
    }

    /// Advance one reference tick with the observed RX level
    pub fn tick(&mut self, level: Level) {
        let Some(result) = self.frame.tick(&self.config, &mut self.bits, level) else {
            return;
        };
        match result {
            Ok(word) => {
                trace!("uart: rx {=u16:#x}", word.data);
                if word.framing {
                    self.sticky |= UartFlags::FRAMING_ERR;
                }
                if word.parity {
                    self.sticky |= UartFlags::PARITY_ERR;
                }
                if self.fifo.push_back(word).is_err() {
                    warn!("uart: rx overrun, word dropped");
                    self.sticky |= UartFlags::OVERRUN;
                    self.overruns = self.overruns.wrapping_add(1);
                    self.unit = Some(UnitStatus::Error(ErrorKind::Overrun));
                } else {
                    self.unit = Some(word.status());
                }
            }
            Err(kind) => {
                warn!("uart: rx line fault, frame lost");
                self.sticky |= UartFlags::LINE_FAULT;
                self.line_faults = self.line_faults.wrapping_add(1);
                self.unit = Some(UnitStatus::Error(kind));
            }
        }
    }
}

#[derive(Debug)]
struct Job {
    handle: TransferHandle,
    tx: Buffer,
    tx_pos: usize,
    rx: Buffer,
    rx_len: usize,
    overruns: u32,
    line_faults: u32,
    error: Option<ErrorKind>,
}

/// Full-duplex UART
pub struct Uart<const N: usize = FIFO_DEPTH> {
    config: UartConfig,
    tx: UartTxHalf<N>,
    rx: UartRxHalf<N>,
    book: TransferBook<()>,
    job: Option<Job>,
    underrun: bool,
}

impl<const N: usize> Uart<N> {
    /// Create an idle UART
    pub fn new(config: UartConfig) -> Self {
        Self {
            config,
            tx: UartTxHalf::new(config),
            rx: UartRxHalf::new(config),
            book: TransferBook::default(),
            job: None,
            underrun: false,
        }
    }

    /// Create an idle UART with a busy policy
    pub fn with_policy(config: UartConfig, policy: BusyPolicy) -> Self {
        let mut uart = Self::new(config);
        uart.book.set_policy(policy);
        uart
    }

    /// Current frame format
    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Apply a new frame format to both halves
    ///
    /// Rejected with [`ErrorKind::Busy`] while either half or a transfer
    /// is busy, and with [`ErrorKind::Unsupported`] for an invalid
    /// configuration.
    pub fn configure(&mut self, config: UartConfig) -> Result<(), ErrorKind> {
        let config = config.validate().map_err(|_| ErrorKind::Unsupported)?;
        if self.is_busy() || !self.book.is_idle() {
            return Err(ErrorKind::Busy);
        }
        self.tx.configure(config)?;
        self.rx.configure(config)?;
        self.config = config;
        Ok(())
    }

    /// Change the busy policy
    pub fn set_busy_policy(&mut self, policy: BusyPolicy) {
        self.book.set_policy(policy);
    }

    /// Check if either half is busy
    pub fn is_busy(&self) -> bool {
        self.tx.is_busy() || self.rx.is_busy()
    }

    /// Borrow both halves for independent stepping
    pub fn split(&mut self) -> (&mut UartTxHalf<N>, &mut UartRxHalf<N>) {
        (&mut self.tx, &mut self.rx)
    }

    /// Queue a word for transmission
    pub fn write(&mut self, word: u16) -> Result<(), ErrorKind> {
        self.tx.write(word)
    }

    /// Take the oldest received word
    pub fn read(&mut self) -> Option<RxWord> {
        self.rx.read()
    }

    /// Outcome of the most recently received word
    pub fn unit_status(&self) -> Option<UnitStatus> {
        self.rx.unit_status()
    }

    /// Record a read of an empty RX FIFO
    pub fn note_underrun(&mut self) {
        self.underrun = true;
    }

    /// Current status, leaving sticky flags set
    pub fn status(&self) -> UartFlags {
        let mut flags = self.rx.sticky;
        flags.set(UartFlags::UNDERRUN, self.underrun);
        flags.set(UartFlags::TX_BUSY, self.tx.is_busy());
        flags.set(UartFlags::TX_FULL, self.tx.is_full());
        flags.set(UartFlags::RX_AVAILABLE, self.rx.available() > 0);
        flags
    }

    /// Current status; clears the sticky flags
    pub fn take_status(&mut self) -> UartFlags {
        let flags = self.status();
        self.rx.sticky = UartFlags::empty();
        self.underrun = false;
        flags
    }

    /// Advance the transmit half one reference tick
    pub fn tick_tx(&mut self) -> Level {
        self.tx.tick()
    }

    /// Advance the receive half one reference tick
    pub fn tick_rx(&mut self, level: Level) {
        self.rx.tick(level);
    }

    /// Advance both halves and any host transfer one reference tick
    ///
    /// `rx` is the observed RX level. Returns the TX level.
    pub fn tick(&mut self, rx: Level) -> Level {
        self.tick_rx(rx);
        self.service_transfer();
        self.tick_tx()
    }

    fn service_transfer(&mut self) {
        if self.job.is_none() {
            let Some(request) = self.book.begin() else {
                return;
            };
            debug!(
                "uart: transfer {} ({} out, {} in)",
                request.handle.id(),
                request.tx.len(),
                request.rx_len
            );
            self.job = Some(Job {
                handle: request.handle,
                tx: request.tx,
                tx_pos: 0,
                rx: Buffer::new(),
                rx_len: request.rx_len,
                overruns: self.rx.overruns(),
                line_faults: self.rx.line_faults(),
                error: None,
            });
        }
        let Some(job) = self.job.as_mut() else {
            return;
        };

        while job.tx_pos < job.tx.len() && !self.tx.is_full() {
            if self.tx.write(job.tx[job.tx_pos] as u16).is_err() {
                break;
            }
            job.tx_pos += 1;
        }

        while job.rx.len() < job.rx_len {
            let Some(word) = self.rx.read() else {
                break;
            };
            let _ = job.rx.push(word.data as u8);
            if let Some(kind) = word.error() {
                job.error.get_or_insert(kind);
            }
        }
        if self.rx.overruns() != job.overruns {
            job.error.get_or_insert(ErrorKind::Overrun);
        }
        if self.rx.line_faults() != job.line_faults {
            // The faulted frame never arrives; stop waiting for more words
            job.error.get_or_insert(ErrorKind::LineFault);
            job.rx_len = job.rx.len();
        }

        let sent = job.tx_pos == job.tx.len() && !self.tx.is_busy();
        if sent && job.rx.len() == job.rx_len {
            if let Some(job) = self.job.take() {
                let status = match job.error {
                    None => TransferStatus::Done,
                    Some(kind) => TransferStatus::Failed(kind),
                };
                debug!("uart: transfer {} finished", job.handle.id());
                self.book.finish(job.handle, status, job.rx);
            }
        }
    }
}

impl<const N: usize> TransferController for Uart<N> {
    type Target = ();

    fn submit_transfer(
        &mut self,
        target: (),
        direction: Direction,
        buffer: &[u8],
        length: usize,
    ) -> Result<TransferHandle, ErrorKind> {
        self.book.submit(target, direction, buffer, length)
    }

    fn poll_status(&self, handle: TransferHandle) -> TransferStatus {
        self.book.status(handle)
    }

    fn abort(&mut self, handle: TransferHandle) {
        if self.book.cancel(handle) {
            return;
        }
        if self.book.active() != Some(handle) {
            return;
        }
        debug!("uart: transfer {} aborted", handle.id());
        self.tx.abort();
        if let Some(job) = self.job.take() {
            self.book.finish(
                job.handle,
                TransferStatus::Failed(ErrorKind::Aborted),
                job.rx,
            );
        }
    }

    fn received(&self, handle: TransferHandle) -> Option<&[u8]> {
        self.book.received(handle)
    }
}
