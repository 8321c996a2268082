//! I2C top controller
//!
//! Sequences controller-mode transactions:
//!
//! ```text
//! START → address + R/W → ack → data (ack/nack each) → STOP
//!                                       └→ repeated START → address + R → ...
//! ```
//!
//! 10-bit addresses send the `11110xx` head byte and the low address
//! byte; reads then use a repeated START with the head byte and R=1.
//! When reading, the controller acknowledges every byte except the last.
//!
//! An unexpected nack brings the bus to STOP before the controller enters
//! [`I2cState::Error`]. Bus faults, line faults and stretch timeouts
//! release both lines instead. `Error` is left only through
//! [`I2cController::reset`] or an abort.

use serwire_hal::{Address, I2cConfig};

use super::bit_tx::{BitEvent, I2cBitTx, Symbol};
use super::byte_rx::I2cByteRx;
use super::byte_tx::{ByteEvent, I2cByteTx};
use super::iobuf::IoBuf;
use super::{I2cDrive, I2cLines};
use crate::error::{ErrorKind, UnitStatus};
use crate::transfer::{
    Buffer, BusyPolicy, Direction, TransferBook, TransferController, TransferHandle,
    TransferStatus,
};

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cState {
    /// No transaction; lines released
    Idle,
    /// Generating START or repeated START
    Start,
    /// Shifting an address byte
    Addr,
    /// Ack slot after an address byte
    AckAddr,
    /// Shifting a data byte
    Data,
    /// Ack slot after a data byte
    AckData,
    /// Generating STOP
    Stop,
    /// Transaction failed; lines released
    Error(ErrorKind),
}

impl I2cState {
    /// Check if a transaction is on the bus
    pub fn is_active(&self) -> bool {
        !matches!(self, I2cState::Idle | I2cState::Error(_))
    }
}

/// Transaction in flight
#[derive(Debug)]
struct Job {
    handle: TransferHandle,
    address: Address,
    tx: Buffer,
    tx_pos: usize,
    rx: Buffer,
    rx_len: usize,
    /// Address phase sends R=1 and data flows from the target
    reading: bool,
    /// 10-bit low address byte still to send
    tail_pending: bool,
    /// Error to report once STOP has completed
    outcome: Option<ErrorKind>,
}

/// I2C controller-mode engine
pub struct I2cController {
    config: I2cConfig,
    io: IoBuf,
    bits: I2cBitTx,
    byte_tx: I2cByteTx,
    byte_rx: I2cByteRx,
    state: I2cState,
    job: Option<Job>,
    book: TransferBook<Address>,
    /// Current byte is an address byte
    addressing: bool,
    abort_requested: bool,
    unit: Option<UnitStatus>,
    lines: I2cLines,
}

impl I2cController {
    /// Create an idle controller
    pub fn new(config: I2cConfig) -> Self {
        Self {
            bits: I2cBitTx::new(&config),
            config,
            io: IoBuf::new(),
            byte_tx: I2cByteTx::new(),
            byte_rx: I2cByteRx::new(),
            state: I2cState::Idle,
            job: None,
            book: TransferBook::default(),
            addressing: false,
            abort_requested: false,
            unit: None,
            lines: I2cLines::IDLE,
        }
    }

    /// Create an idle controller with a busy policy
    pub fn with_policy(config: I2cConfig, policy: BusyPolicy) -> Self {
        let mut ctrl = Self::new(config);
        ctrl.book.set_policy(policy);
        ctrl
    }

    /// Current configuration
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    /// Apply a new configuration
    ///
    /// Rejected with [`ErrorKind::Busy`] unless the controller is idle,
    /// and with [`ErrorKind::Unsupported`] for an invalid configuration.
    pub fn configure(&mut self, config: I2cConfig) -> Result<(), ErrorKind> {
        let config = config.validate().map_err(|_| ErrorKind::Unsupported)?;
        if self.state != I2cState::Idle || !self.book.is_idle() {
            return Err(ErrorKind::Busy);
        }
        self.bits.configure(&config);
        self.config = config;
        Ok(())
    }

    /// Change the busy policy
    pub fn set_busy_policy(&mut self, policy: BusyPolicy) {
        self.book.set_policy(policy);
    }

    /// Current state
    pub fn state(&self) -> I2cState {
        self.state
    }

    /// Outcome of the most recently completed byte
    pub fn unit_status(&self) -> Option<UnitStatus> {
        self.unit
    }

    /// Our current drive of SCL and SDA
    pub fn drive(&self) -> I2cDrive {
        self.io.drive()
    }

    /// I/O buffer holding our drive
    pub fn io(&self) -> &IoBuf {
        &self.io
    }

    /// Bus levels observed on the last tick
    pub fn lines(&self) -> I2cLines {
        self.lines
    }

    /// Leave the error state
    ///
    /// Any transaction in flight is dropped as aborted and both lines are
    /// released. Queued transfers stay queued.
    pub fn reset(&mut self) {
        self.bits.reset(self.lines);
        self.byte_tx.reset();
        self.byte_rx.reset();
        self.io.release();
        self.abort_requested = false;
        if let Some(job) = self.job.take() {
            self.book.finish(
                job.handle,
                TransferStatus::Failed(ErrorKind::Aborted),
                job.rx,
            );
        }
        self.state = I2cState::Idle;
    }

    /// Advance one reference tick
    ///
    /// `external` is what the other bus parties drive (or the level read
    /// back from the pins). Returns our drive for this tick.
    pub fn tick(&mut self, external: I2cLines) -> I2cDrive {
        let lines = self.io.resolve(external);
        self.lines = lines;

        match self.state {
            I2cState::Idle => self.start_next(),
            I2cState::Error(_) => {}
            I2cState::Start => self.step_start(lines),
            I2cState::Addr | I2cState::AckAddr | I2cState::Data | I2cState::AckData => {
                self.step_byte(lines)
            }
            I2cState::Stop => self.step_stop(lines),
        }

        self.io.set(self.bits.drive());
        self.io.drive()
    }

    fn start_next(&mut self) {
        let Some(request) = self.book.begin() else {
            return;
        };
        let ten_bit = request.target.is_ten_bit();
        debug!(
            "i2c: transfer {} to {} ({} out, {} in)",
            request.handle.id(),
            request.target,
            request.tx.len(),
            request.rx_len
        );
        self.job = Some(Job {
            handle: request.handle,
            address: request.target,
            tx: request.tx,
            tx_pos: 0,
            rx: Buffer::new(),
            rx_len: request.rx_len,
            reading: request.direction == Direction::Read && !ten_bit,
            tail_pending: ten_bit,
            outcome: None,
        });
        self.abort_requested = false;
        self.begin_start();
    }

    fn begin_start(&mut self) {
        match self.bits.begin(Symbol::Start) {
            Ok(()) => self.state = I2cState::Start,
            Err(kind) => self.fail(kind),
        }
    }

    fn step_start(&mut self, lines: I2cLines) {
        match self.bits.tick(lines) {
            BitEvent::Idle | BitEvent::Busy => {}
            BitEvent::Fault(kind) => self.fail(kind),
            BitEvent::Done(_) => {
                if self.abort_requested {
                    self.begin_stop(Some(ErrorKind::Aborted));
                    return;
                }
                let Some(job) = self.job.as_ref() else {
                    self.fail(ErrorKind::Aborted);
                    return;
                };
                let head = job.address.head_byte(job.reading);
                self.addressing = true;
                self.send(head);
            }
        }
    }

    fn step_byte(&mut self, lines: I2cLines) {
        let halt = self.abort_requested;
        let transmitting = self.byte_tx.is_active();
        let event = if transmitting {
            self.byte_tx.tick(&mut self.bits, lines, halt)
        } else {
            self.byte_rx.tick(&mut self.bits, lines, halt)
        };

        match event {
            ByteEvent::Idle | ByteEvent::Busy => self.label_byte_state(),
            ByteEvent::Halted => self.begin_stop(Some(ErrorKind::Aborted)),
            ByteEvent::Acked => {
                self.unit = Some(UnitStatus::Ack);
                self.advance();
            }
            ByteEvent::Nacked => {
                self.unit = Some(UnitStatus::Nack);
                warn!("i2c: nack (address phase: {})", self.addressing);
                self.begin_stop(Some(ErrorKind::Nack));
            }
            ByteEvent::Received(byte) => {
                self.unit = Some(UnitStatus::Ok);
                if let Some(job) = self.job.as_mut() {
                    let _ = job.rx.push(byte);
                }
                self.advance();
            }
            ByteEvent::Fault(kind) => {
                self.unit = Some(UnitStatus::Error(kind));
                self.fail(kind);
            }
        }
    }

    /// Decide what follows a completed byte
    fn advance(&mut self) {
        if self.abort_requested {
            self.begin_stop(Some(ErrorKind::Aborted));
            return;
        }
        let Some(job) = self.job.as_mut() else {
            self.fail(ErrorKind::Aborted);
            return;
        };

        if self.addressing && job.tail_pending {
            job.tail_pending = false;
            let tail = job.address.tail_byte().unwrap_or_default();
            self.send(tail);
            return;
        }
        self.addressing = false;

        if job.reading {
            if job.rx.len() < job.rx_len {
                let last = job.rx.len() + 1 == job.rx_len;
                let started = self.byte_rx.start(!last, &mut self.bits);
                match started {
                    Ok(()) => self.state = I2cState::Data,
                    Err(kind) => self.fail(kind),
                }
            } else {
                self.begin_stop(None);
            }
        } else if job.tx_pos < job.tx.len() {
            let byte = job.tx[job.tx_pos];
            job.tx_pos += 1;
            self.send(byte);
        } else if job.rx_len > 0 {
            // Repeated START turns the bus around for the read
            job.reading = true;
            self.begin_start();
        } else {
            self.begin_stop(None);
        }
    }

    fn send(&mut self, byte: u8) {
        match self.byte_tx.load(byte, &mut self.bits) {
            Ok(()) => {
                self.state = if self.addressing {
                    I2cState::Addr
                } else {
                    I2cState::Data
                };
            }
            Err(kind) => self.fail(kind),
        }
    }

    fn label_byte_state(&mut self) {
        let ack_slot = self.byte_tx.in_ack_slot() || self.byte_rx.in_ack_slot();
        self.state = match (self.addressing, ack_slot) {
            (true, false) => I2cState::Addr,
            (true, true) => I2cState::AckAddr,
            (false, false) => I2cState::Data,
            (false, true) => I2cState::AckData,
        };
    }

    fn begin_stop(&mut self, outcome: Option<ErrorKind>) {
        if let Some(job) = self.job.as_mut() {
            job.outcome = outcome;
        }
        match self.bits.begin(Symbol::Stop) {
            Ok(()) => self.state = I2cState::Stop,
            Err(kind) => self.fail(kind),
        }
    }

    fn step_stop(&mut self, lines: I2cLines) {
        match self.bits.tick(lines) {
            BitEvent::Idle | BitEvent::Busy => {}
            BitEvent::Fault(kind) => self.fail(kind),
            BitEvent::Done(_) => {
                let Some(job) = self.job.take() else {
                    self.state = I2cState::Idle;
                    return;
                };
                self.abort_requested = false;
                match job.outcome {
                    None => {
                        debug!("i2c: transfer {} done", job.handle.id());
                        self.book.finish(job.handle, TransferStatus::Done, job.rx);
                        self.state = I2cState::Idle;
                    }
                    Some(ErrorKind::Aborted) => {
                        debug!("i2c: transfer {} aborted", job.handle.id());
                        self.book.finish(
                            job.handle,
                            TransferStatus::Failed(ErrorKind::Aborted),
                            job.rx,
                        );
                        self.state = I2cState::Idle;
                    }
                    Some(kind) => {
                        self.book
                            .finish(job.handle, TransferStatus::Failed(kind), job.rx);
                        self.state = I2cState::Error(kind);
                    }
                }
            }
        }
    }

    /// Release the bus and enter the error state
    fn fail(&mut self, kind: ErrorKind) {
        warn!("i2c: transfer failed: {}", kind);
        self.bits.reset(self.lines);
        self.byte_tx.reset();
        self.byte_rx.reset();
        self.abort_requested = false;
        if let Some(job) = self.job.take() {
            self.book
                .finish(job.handle, TransferStatus::Failed(kind), job.rx);
        }
        self.state = I2cState::Error(kind);
    }
}

impl TransferController for I2cController {
    type Target = Address;

    fn submit_transfer(
        &mut self,
        target: Address,
        direction: Direction,
        buffer: &[u8],
        length: usize,
    ) -> Result<TransferHandle, ErrorKind> {
        if matches!(self.state, I2cState::Error(_)) {
            return Err(ErrorKind::Busy);
        }
        if target.validate().is_err() {
            return Err(ErrorKind::Unsupported);
        }
        if direction == Direction::Read && length == 0 {
            // A read must clock at least one byte to end with a nack
            return Err(ErrorKind::Unsupported);
        }
        self.book.submit(target, direction, buffer, length)
    }

    fn poll_status(&self, handle: TransferHandle) -> TransferStatus {
        self.book.status(handle)
    }

    fn abort(&mut self, handle: TransferHandle) {
        if self.book.cancel(handle) {
            return;
        }
        match self.state {
            I2cState::Error(_) => self.state = I2cState::Idle,
            I2cState::Stop | I2cState::Idle => {}
            _ => {
                if self.book.active() == Some(handle) {
                    debug!("i2c: abort requested for {}", handle.id());
                    self.abort_requested = true;
                }
            }
        }
    }

    fn received(&self, handle: TransferHandle) -> Option<&[u8]> {
        self.book.received(handle)
    }
}
