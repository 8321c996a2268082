//! SPI top controller
//!
//! Runs full-duplex transfers framed by a single chip-select assertion:
//!
//! ```text
//! CS low → half period → cycles (word_bits × words) → half period → CS high
//! ```
//!
//! Each clock cycle is a leading and a trailing SCLK edge, `divisor`
//! reference ticks apart. MISO is sampled just before the capture edge;
//! MOSI changes on the shift edge. In CPHA=0 modes the first bit of each
//! transfer is presented when CS asserts.
//!
//! Words wider than 8 bits travel as two little-endian bytes in the
//! transfer buffers.

use serwire_hal::{Level, SpiConfig};

use super::bit_rx::SpiBitRx;
use super::bit_tx::SpiBitTx;
use super::byte_rx::ShiftIn;
use super::byte_tx::ShiftOut;
use super::clock::{Edge, SclkGen};
use super::SpiOutputs;
use crate::error::{ErrorKind, UnitStatus};
use crate::sample::Sample;
use crate::transfer::{
    Buffer, BusyPolicy, Direction, TransferBook, TransferController, TransferHandle,
    TransferStatus,
};

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiState {
    /// CS deasserted, SCLK idle
    Idle,
    /// CS asserted, waiting half a period before the first edge
    Setup,
    /// Clocking words
    Clocking,
    /// Last cycle done, waiting half a period before CS deasserts
    Hold,
}

#[derive(Debug)]
struct Job {
    handle: TransferHandle,
    tx: Buffer,
    rx: Buffer,
    rx_len: usize,
    words: usize,
    next_word: usize,
    outcome: Option<ErrorKind>,
}

/// SPI controller-mode engine
pub struct SpiController {
    config: SpiConfig,
    clock: SclkGen,
    mosi: SpiBitTx,
    miso: SpiBitRx,
    shift_out: ShiftOut,
    shift_in: ShiftIn,
    state: SpiState,
    job: Option<Job>,
    book: TransferBook<()>,
    selected: bool,
    cycles: u32,
    last_cycles: u32,
    abort_requested: bool,
    unit: Option<UnitStatus>,
}

impl SpiController {
    /// Create an idle controller
    pub fn new(config: SpiConfig) -> Self {
        Self {
            clock: SclkGen::new(config.divisor, config.mode),
            mosi: SpiBitTx::new(config.mode),
            miso: SpiBitRx::new(config.mode, config.settle_ticks),
            shift_out: ShiftOut::new(config.word_bits, config.bit_order),
            shift_in: ShiftIn::new(config.word_bits, config.bit_order),
            config,
            state: SpiState::Idle,
            job: None,
            book: TransferBook::default(),
            selected: false,
            cycles: 0,
            last_cycles: 0,
            abort_requested: false,
            unit: None,
        }
    }

    /// Create an idle controller with a busy policy
    pub fn with_policy(config: SpiConfig, policy: BusyPolicy) -> Self {
        let mut ctrl = Self::new(config);
        ctrl.book.set_policy(policy);
        ctrl
    }

    /// Current configuration
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// Apply a new configuration
    ///
    /// Rejected with [`ErrorKind::Busy`] unless the controller is idle,
    /// and with [`ErrorKind::Unsupported`] for an invalid configuration.
    pub fn configure(&mut self, config: SpiConfig) -> Result<(), ErrorKind> {
        let config = config.validate().map_err(|_| ErrorKind::Unsupported)?;
        if self.state != SpiState::Idle || !self.book.is_idle() {
            return Err(ErrorKind::Busy);
        }
        self.clock.configure(config.divisor, config.mode);
        self.mosi.configure(config.mode);
        self.miso.configure(config.mode, config.settle_ticks);
        self.shift_out.configure(config.word_bits, config.bit_order);
        self.shift_in.configure(config.word_bits, config.bit_order);
        self.config = config;
        Ok(())
    }

    /// Change the busy policy
    pub fn set_busy_policy(&mut self, policy: BusyPolicy) {
        self.book.set_policy(policy);
    }

    /// Current state
    pub fn state(&self) -> SpiState {
        self.state
    }

    /// Outcome of the most recently completed word
    pub fn unit_status(&self) -> Option<UnitStatus> {
        self.unit
    }

    /// SCLK cycles generated by the most recent transfer
    pub fn last_cycles(&self) -> u32 {
        self.last_cycles
    }

    /// Levels currently driven
    pub fn outputs(&self) -> SpiOutputs {
        SpiOutputs {
            sclk: self.clock.level(),
            mosi: self.mosi.level(),
            cs: Level::from(!self.selected),
        }
    }

    /// Advance one reference tick
    ///
    /// `miso` is the level read from the peripheral. Returns the levels
    /// driven for this tick.
    pub fn tick(&mut self, miso: Level) -> SpiOutputs {
        match self.state {
            SpiState::Idle => self.start_next(),
            SpiState::Setup => {
                if self.abort_requested {
                    self.enter_hold();
                } else if self.clock.due() {
                    self.state = SpiState::Clocking;
                    self.step_clock(miso);
                }
            }
            SpiState::Clocking => {
                if self.clock.due() {
                    self.step_clock(miso);
                }
            }
            SpiState::Hold => {
                if self.clock.due() {
                    self.deselect();
                }
            }
        }
        self.outputs()
    }

    fn start_next(&mut self) {
        let Some(request) = self.book.begin() else {
            return;
        };
        let bpw = self.config.bytes_per_word();
        let bytes = request.tx.len().max(request.rx_len);
        debug!(
            "spi: transfer {} ({} out, {} in)",
            request.handle.id(),
            request.tx.len(),
            request.rx_len
        );

        self.job = Some(Job {
            handle: request.handle,
            tx: request.tx,
            rx: Buffer::new(),
            rx_len: request.rx_len,
            words: bytes / bpw,
            next_word: 0,
            outcome: None,
        });
        self.abort_requested = false;
        self.cycles = 0;
        self.shift_out.clear();
        self.shift_in.clear();
        self.miso.reset();
        self.selected = true;
        self.clock.idle();
        self.clock.restart();
        self.state = SpiState::Setup;

        if self.config.mode.captures_on_leading() {
            // CPHA=0: the first bit must be on MOSI before the first edge
            self.shift_next_bit();
        }
    }

    /// Handle the end of a half period
    fn step_clock(&mut self, miso: Level) {
        let edge = self.clock.next_edge();

        // Cycle boundary: stop here when done or aborted
        if edge == Edge::Leading && (self.abort_requested || self.cycles_remaining() == 0) {
            self.enter_hold();
            return;
        }

        if self.miso.is_capture_edge(edge) {
            match self.miso.sample(miso) {
                Sample::Bit(bit) => self.capture(bit),
                // Hold the edge back until MISO settles
                Sample::Pending => return,
                Sample::Fault => {
                    self.unit = Some(UnitStatus::Error(ErrorKind::LineFault));
                    self.fail(ErrorKind::LineFault);
                    return;
                }
            }
        }

        self.clock.toggle();
        if edge == Edge::Leading {
            self.cycles += 1;
        }
        // MOSI holds its last bit once the final cycle is complete
        let finished = edge == Edge::Trailing && self.cycles_remaining() == 0;
        if self.mosi.is_shift_edge(edge) && !finished {
            self.shift_next_bit();
        }
    }

    fn cycles_remaining(&self) -> u32 {
        let total = self
            .job
            .as_ref()
            .map_or(0, |job| job.words as u32 * self.config.word_bits as u32);
        total.saturating_sub(self.cycles)
    }

    /// Put the next outgoing bit on MOSI, loading a new word if needed
    fn shift_next_bit(&mut self) {
        if self.shift_out.is_empty() {
            let Some(job) = self.job.as_mut() else {
                return;
            };
            if job.next_word >= job.words {
                return;
            }
            let word = word_at(&job.tx, job.next_word, self.config.bytes_per_word());
            job.next_word += 1;
            // Register is empty, load cannot be refused
            let _ = self.shift_out.load(word & self.config.word_mask());
        }
        if let Some(bit) = self.shift_out.next_bit() {
            self.mosi.present(bit);
        }
    }

    fn capture(&mut self, bit: bool) {
        let Some(word) = self.shift_in.push(bit) else {
            return;
        };
        trace!("spi: word {=u16:#x}", word);
        self.unit = Some(UnitStatus::Ok);
        let bpw = self.config.bytes_per_word();
        if let Some(job) = self.job.as_mut() {
            for byte in word.to_le_bytes().iter().take(bpw) {
                if job.rx.len() < job.rx_len {
                    let _ = job.rx.push(*byte);
                }
            }
        }
    }

    fn enter_hold(&mut self) {
        if self.abort_requested {
            if let Some(job) = self.job.as_mut() {
                job.outcome = Some(ErrorKind::Aborted);
            }
        }
        self.clock.idle();
        self.clock.restart();
        self.state = SpiState::Hold;
    }

    /// Deassert CS and report the transfer
    fn deselect(&mut self) {
        self.selected = false;
        self.abort_requested = false;
        self.last_cycles = self.cycles;
        self.state = SpiState::Idle;
        if let Some(job) = self.job.take() {
            let status = match job.outcome {
                None => TransferStatus::Done,
                Some(kind) => TransferStatus::Failed(kind),
            };
            debug!(
                "spi: transfer {} finished after {} cycles",
                job.handle.id(),
                self.cycles
            );
            self.book.finish(job.handle, status, job.rx);
        }
    }

    /// Abandon the transfer, returning SCLK to idle and deasserting CS
    fn fail(&mut self, kind: ErrorKind) {
        warn!("spi: transfer failed: {}", kind);
        self.clock.idle();
        self.shift_out.clear();
        self.shift_in.clear();
        self.miso.reset();
        if let Some(job) = self.job.as_mut() {
            job.outcome = Some(kind);
        }
        self.deselect();
    }
}

/// Word `index` of a buffer holding `bpw`-byte little-endian words
///
/// Positions past the end of the buffer read as zero.
fn word_at(buf: &[u8], index: usize, bpw: usize) -> u16 {
    let start = index * bpw;
    let lo = buf.get(start).copied().unwrap_or(0) as u16;
    if bpw == 1 {
        return lo;
    }
    let hi = buf.get(start + 1).copied().unwrap_or(0) as u16;
    lo | (hi << 8)
}

impl TransferController for SpiController {
    type Target = ();

    fn submit_transfer(
        &mut self,
        target: (),
        direction: Direction,
        buffer: &[u8],
        length: usize,
    ) -> Result<TransferHandle, ErrorKind> {
        let bpw = self.config.bytes_per_word();
        let tx_len = match direction {
            Direction::Write => length.min(buffer.len()),
            Direction::Read => 0,
            Direction::Exchange => buffer.len(),
        };
        if bpw > 1 && (tx_len % bpw != 0 || length % bpw != 0) {
            // Wide words need whole byte pairs
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
        if self.state != SpiState::Idle && self.book.active() == Some(handle) {
            debug!("spi: abort requested for {}", handle.id());
            self.abort_requested = true;
        }
    }

    fn received(&self, handle: TransferHandle) -> Option<&[u8]> {
        self.book.received(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::spi::{step, SpiPeer};
    use proptest::prelude::*;
    use serwire_hal::{BitOrder, Mode};
    use std::vec::Vec;

    fn config(mode: Mode) -> SpiConfig {
        SpiConfig {
            divisor: 2,
            mode,
            ..SpiConfig::default()
        }
    }

    fn peer_for(config: &SpiConfig) -> SpiPeer {
        SpiPeer::new(config.mode, config.bit_order, config.word_bits)
    }

    /// Step until the handle resolves, recording every tick's outputs
    fn run(
        ctrl: &mut SpiController,
        peer: &mut SpiPeer,
        handle: TransferHandle,
    ) -> (TransferStatus, Vec<SpiOutputs>) {
        let mut trace = Vec::new();
        for _ in 0..50_000 {
            trace.push(step(ctrl, peer));
            let status = ctrl.poll_status(handle);
            if status != TransferStatus::Pending {
                return (status, trace);
            }
        }
        panic!("transfer never finished");
    }

    #[test]
    fn test_mode0_edges() {
        let cfg = config(Mode::Mode0);
        let mut ctrl = SpiController::new(cfg);
        let mut peer = peer_for(&cfg).with_response(&[0x3C]);
        let h = ctrl
            .submit_transfer((), Direction::Exchange, &[0xA5], 1)
            .unwrap();

        let (status, trace) = run(&mut ctrl, &mut peer, h);
        assert_eq!(status, TransferStatus::Done);
        assert_eq!(ctrl.received(h), Some(&[0x3C][..]));
        assert_eq!(peer.received(), &[0xA5]);

        let mut prev = SpiOutputs {
            sclk: Level::Low,
            mosi: Level::Low,
            cs: Level::High,
        };
        let mut rising = 0;
        let mut cs_edges = 0;
        for out in &trace {
            if out.cs != prev.cs {
                cs_edges += 1;
            }
            if out.sclk.is_high() && prev.sclk.is_low() {
                rising += 1;
                assert!(out.selected());
                // MOSI is stable across the capture edge
                assert_eq!(out.mosi, prev.mosi);
            }
            if out.mosi != prev.mosi && prev.selected() {
                assert!(out.sclk.is_low() && prev.sclk.is_high());
            }
            prev = *out;
        }
        assert_eq!(rising, 8);
        assert_eq!(cs_edges, 2);
        assert_eq!(ctrl.last_cycles(), 8);
        assert_eq!(ctrl.outputs().sclk, Level::Low);
    }

    #[test]
    fn test_cycles_equal_bits_times_length() {
        let mut cfg = config(Mode::Mode3);
        cfg.word_bits = 12;
        let mut ctrl = SpiController::new(cfg);
        let mut peer = peer_for(&cfg);
        let h = ctrl
            .submit_transfer((), Direction::Write, &[0x34, 0x02, 0xFF, 0x0F], 4)
            .unwrap();

        let (status, _) = run(&mut ctrl, &mut peer, h);
        assert_eq!(status, TransferStatus::Done);
        assert_eq!(ctrl.last_cycles(), 24);
        assert_eq!(peer.received(), &[0x234, 0xFFF]);
        assert_eq!(peer.selections(), 1);
    }

    #[test]
    fn test_read_clocks_zeros() {
        let cfg = config(Mode::Mode1);
        let mut ctrl = SpiController::new(cfg);
        let mut peer = peer_for(&cfg).with_response(&[0x81, 0x7E]);
        let h = ctrl.submit_transfer((), Direction::Read, &[], 2).unwrap();

        let (status, _) = run(&mut ctrl, &mut peer, h);
        assert_eq!(status, TransferStatus::Done);
        assert_eq!(ctrl.received(h), Some(&[0x81, 0x7E][..]));
        assert_eq!(peer.received(), &[0x00, 0x00]);
    }

    #[test]
    fn test_unknown_miso_is_line_fault() {
        let cfg = config(Mode::Mode0);
        let mut ctrl = SpiController::new(cfg);
        let h = ctrl.submit_transfer((), Direction::Read, &[], 1).unwrap();

        let mut status = TransferStatus::Pending;
        for _ in 0..100 {
            ctrl.tick(Level::Unknown);
            status = ctrl.poll_status(h);
            if status != TransferStatus::Pending {
                break;
            }
        }
        assert_eq!(status, TransferStatus::Failed(ErrorKind::LineFault));
        assert_eq!(ctrl.state(), SpiState::Idle);
        assert!(!ctrl.outputs().selected());
    }

    #[test]
    fn test_abort_finishes_cycle() {
        let cfg = config(Mode::Mode0);
        let mut ctrl = SpiController::new(cfg);
        let mut peer = peer_for(&cfg);
        let h = ctrl
            .submit_transfer((), Direction::Write, &[0xFF, 0xFF], 2)
            .unwrap();

        for _ in 0..7 {
            step(&mut ctrl, &mut peer);
        }
        ctrl.abort(h);
        let (status, trace) = run(&mut ctrl, &mut peer, h);
        assert_eq!(status, TransferStatus::Failed(ErrorKind::Aborted));
        assert!(ctrl.last_cycles() < 16);
        assert_eq!(peer.selections(), 1);
        // SCLK back at idle before CS deasserts
        let last = trace[trace.len() - 1];
        assert!(!last.selected());
        assert_eq!(last.sclk, Level::Low);
    }

    #[test]
    fn test_abort_idle_is_noop() {
        let cfg = config(Mode::Mode0);
        let mut ctrl = SpiController::new(cfg);
        let mut peer = peer_for(&cfg);
        let h = ctrl.submit_transfer((), Direction::Write, &[0x01], 1).unwrap();
        run(&mut ctrl, &mut peer, h);

        ctrl.abort(h);
        assert_eq!(ctrl.poll_status(h), TransferStatus::Done);
        assert_eq!(ctrl.state(), SpiState::Idle);
    }

    #[test]
    fn test_odd_length_with_wide_words_rejected() {
        let mut cfg = config(Mode::Mode0);
        cfg.word_bits = 9;
        let mut ctrl = SpiController::new(cfg);
        assert_eq!(
            ctrl.submit_transfer((), Direction::Write, &[1, 2, 3], 3),
            Err(ErrorKind::Unsupported)
        );
    }

    #[test]
    fn test_configure_while_busy_rejected() {
        let cfg = config(Mode::Mode0);
        let mut ctrl = SpiController::new(cfg);
        ctrl.submit_transfer((), Direction::Write, &[1], 1).unwrap();
        ctrl.tick(Level::Low);
        assert_eq!(ctrl.configure(config(Mode::Mode2)), Err(ErrorKind::Busy));
    }

    #[test]
    fn test_configure_invalid_word_size() {
        let mut ctrl = SpiController::new(config(Mode::Mode0));
        let bad = SpiConfig {
            word_bits: 17,
            ..config(Mode::Mode1)
        };
        assert_eq!(ctrl.configure(bad), Err(ErrorKind::Unsupported));
        assert_eq!(ctrl.config().mode, Mode::Mode0);
    }

    fn mode_strategy() -> impl Strategy<Value = Mode> {
        (0u8..4).prop_map(|i| Mode::from_index(i).unwrap_or_default())
    }

    fn order_strategy() -> impl Strategy<Value = BitOrder> {
        prop_oneof![Just(BitOrder::MsbFirst), Just(BitOrder::LsbFirst)]
    }

    proptest! {
        #[test]
        fn test_word_round_trip(
            mode in mode_strategy(),
            bit_order in order_strategy(),
            word_bits in 4u8..=16,
            divisor in 1u16..4,
            seed in proptest::collection::vec(any::<u16>(), 1..6),
        ) {
            let cfg = SpiConfig { divisor, mode, bit_order, word_bits, ..SpiConfig::default() };
            let mask = cfg.word_mask();
            let words: Vec<u16> = seed.iter().map(|w| w & mask).collect();
            let reply: Vec<u16> = words.iter().map(|w| !w & mask).collect();

            let mut tx = Vec::new();
            for w in &words {
                tx.extend_from_slice(&w.to_le_bytes()[..cfg.bytes_per_word()]);
            }

            let mut ctrl = SpiController::new(cfg);
            let mut peer = peer_for(&cfg).with_response(&reply);
            let h = ctrl.submit_transfer((), Direction::Exchange, &tx, tx.len()).unwrap();
            let (status, _) = run(&mut ctrl, &mut peer, h);

            prop_assert_eq!(status, TransferStatus::Done);
            prop_assert_eq!(peer.received(), &words[..]);
            prop_assert_eq!(ctrl.last_cycles(), word_bits as u32 * words.len() as u32);

            let rx = ctrl.received(h).unwrap_or_default();
            let got: Vec<u16> = rx
                .chunks(cfg.bytes_per_word())
                .map(|c| c.iter().rev().fold(0u16, |acc, b| (acc << 8) | *b as u16))
                .collect();
            prop_assert_eq!(got, reply);
        }
    }
}
