//! I2C bit transmit engine
//!
//! Runs one SCL cycle per symbol with open-drain discipline: lines are
//! only ever pulled low or released. A cycle is four phases of `divisor`
//! reference ticks each:
//!
//! ```text
//! Setup  SCL low, SDA set up
//! Rise   SCL released; waits while a target stretches the clock
//! High   SCL high; SDA sampled at the end of the phase
//! Fall   SCL pulled low
//! ```
//!
//! START and STOP replace Fall (or follow High) with an SDA edge while SCL
//! is high. SDA is always sampled a full phase after the last change of
//! our own drive.

use serwire_hal::{Drive, I2cConfig};

use super::bit_rx::{Condition, I2cBitRx};
use super::{I2cDrive, I2cLines};
use crate::clock::ClockDivider;
use crate::error::ErrorKind;
use crate::sample::Sample;

/// One SCL cycle worth of bus activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Symbol {
    /// START (or repeated START) condition
    Start,
    /// STOP condition; leaves both lines released
    Stop,
    /// Transmit a bit; a released 1 that reads back 0 is contention
    Drive(bool),
    /// Release SDA and sample what the target drives
    Release,
}

impl Symbol {
    /// SDA drive during the setup phase
    fn setup_sda(self) -> Drive {
        match self {
            Symbol::Start | Symbol::Release | Symbol::Drive(true) => Drive::Release,
            Symbol::Stop | Symbol::Drive(false) => Drive::Low,
        }
    }
}

/// Outcome of one reference tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitEvent {
    /// No symbol in progress
    Idle,
    /// Symbol in progress
    Busy,
    /// Symbol finished; carries the SDA level sampled while SCL was high
    Done(bool),
    /// Symbol failed; both lines have been released
    Fault(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Setup,
    Rise,
    High,
    Edge,
    Fall,
}

/// I2C bit transmitter
#[derive(Debug, Clone)]
pub struct I2cBitTx {
    rx: I2cBitRx,
    divider: ClockDivider,
    drive: I2cDrive,
    symbol: Symbol,
    phase: Phase,
    /// Current phase has run its full length
    due: bool,
    sampled: bool,
    stretch: u32,
    stretch_timeout: u32,
}

impl I2cBitTx {
    /// Create an idle engine with both lines released
    pub fn new(config: &I2cConfig) -> Self {
        Self {
            rx: I2cBitRx::new(config.settle_ticks),
            divider: ClockDivider::new(config.divisor),
            drive: I2cDrive::RELEASED,
            symbol: Symbol::Release,
            phase: Phase::Idle,
            due: false,
            sampled: true,
            stretch: 0,
            stretch_timeout: config.stretch_timeout,
        }
    }

    /// Apply new timing; only call while idle
    pub fn configure(&mut self, config: &I2cConfig) {
        self.divider.set_divisor(config.divisor);
        self.rx.set_settle(config.settle_ticks);
        self.stretch_timeout = config.stretch_timeout;
    }

    /// Our current drive of SCL and SDA
    pub fn drive(&self) -> I2cDrive {
        self.drive
    }

    /// Check if no symbol is in progress
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Reference ticks the clock has been stretched in the current cycle
    pub fn stretched_ticks(&self) -> u32 {
        self.stretch
    }

    /// Start a symbol
    ///
    /// The setup phase begins on this tick.
    pub fn begin(&mut self, symbol: Symbol) -> Result<(), ErrorKind> {
        if self.phase != Phase::Idle {
            return Err(ErrorKind::Busy);
        }
        self.symbol = symbol;
        self.drive.sda = symbol.setup_sda();
        self.stretch = 0;
        self.enter(Phase::Setup);
        Ok(())
    }

    /// Drop any symbol in progress and release both lines
    pub fn reset(&mut self, lines: I2cLines) {
        self.phase = Phase::Idle;
        self.drive = I2cDrive::RELEASED;
        self.rx.reset(lines);
    }

    /// Advance one reference tick
    ///
    /// Once SCL has been released for the symbol, any START or STOP that
    /// is not the edge of our own START or STOP faults the symbol with
    /// [`ErrorKind::BusFault`].
    pub fn tick(&mut self, lines: I2cLines) -> BitEvent {
        let condition = self.rx.observe(lines);
        if self.clocking() && condition.is_some() && condition != self.own_condition() {
            warn!("i2c: START/STOP by another party while SCL high");
            return self.fault(ErrorKind::BusFault);
        }

        match self.phase {
            Phase::Idle => BitEvent::Idle,
            Phase::Setup => {
                if self.due() {
                    self.drive.scl = Drive::Release;
                    self.enter(Phase::Rise);
                }
                BitEvent::Busy
            }
            Phase::Rise => self.rise(lines),
            Phase::High => {
                if !self.due() {
                    return BitEvent::Busy;
                }
                match self.rx.sample_sda(lines) {
                    Sample::Bit(bit) => self.high_sampled(bit),
                    Sample::Pending => BitEvent::Busy,
                    Sample::Fault => self.fault(ErrorKind::LineFault),
                }
            }
            Phase::Edge => {
                if !self.due() {
                    return BitEvent::Busy;
                }
                if self.symbol != Symbol::Stop {
                    self.drive.scl = Drive::Low;
                    self.enter(Phase::Fall);
                    return BitEvent::Busy;
                }
                // STOP is complete once SDA reads back high
                match self.rx.sample_sda(lines) {
                    Sample::Bit(true) => {
                        self.phase = Phase::Idle;
                        BitEvent::Done(true)
                    }
                    Sample::Bit(false) => self.fault(ErrorKind::BusFault),
                    Sample::Pending => BitEvent::Busy,
                    Sample::Fault => self.fault(ErrorKind::LineFault),
                }
            }
            Phase::Fall => {
                if self.due() {
                    self.phase = Phase::Idle;
                    BitEvent::Done(self.sampled)
                } else {
                    BitEvent::Busy
                }
            }
        }
    }

    fn rise(&mut self, lines: I2cLines) -> BitEvent {
        if !self.due() {
            return BitEvent::Busy;
        }
        match self.rx.sample_scl(lines) {
            Sample::Bit(true) => {
                self.enter(Phase::High);
                BitEvent::Busy
            }
            Sample::Bit(false) => {
                // Released but held low: a target is stretching
                self.stretch += 1;
                if self.stretch > self.stretch_timeout {
                    warn!("i2c: SCL held low for {} ticks", self.stretch);
                    self.fault(ErrorKind::Timeout)
                } else {
                    BitEvent::Busy
                }
            }
            Sample::Pending => BitEvent::Busy,
            Sample::Fault => self.fault(ErrorKind::LineFault),
        }
    }

    /// SCL has been released for the current symbol
    fn clocking(&self) -> bool {
        !matches!(self.phase, Phase::Idle | Phase::Setup)
    }

    /// Condition our own SDA edge produces in the current phase
    fn own_condition(&self) -> Option<Condition> {
        match (self.phase, self.symbol) {
            (Phase::Edge, Symbol::Start) => Some(Condition::Start),
            (Phase::Edge, Symbol::Stop) => Some(Condition::Stop),
            _ => None,
        }
    }

    fn high_sampled(&mut self, bit: bool) -> BitEvent {
        self.sampled = bit;
        match self.symbol {
            Symbol::Drive(true) | Symbol::Start if !bit => self.fault(ErrorKind::BusFault),
            Symbol::Start => {
                self.drive.sda = Drive::Low;
                self.enter(Phase::Edge);
                BitEvent::Busy
            }
            Symbol::Stop => {
                self.drive.sda = Drive::Release;
                self.enter(Phase::Edge);
                BitEvent::Busy
            }
            Symbol::Drive(_) | Symbol::Release => {
                self.drive.scl = Drive::Low;
                self.enter(Phase::Fall);
                BitEvent::Busy
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.due = false;
        self.divider.restart();
    }

    /// Check if the current phase has run its full length
    fn due(&mut self) -> bool {
        if !self.due {
            self.due = self.divider.tick();
        }
        self.due
    }

    fn fault(&mut self, kind: ErrorKind) -> BitEvent {
        self.drive = I2cDrive::RELEASED;
        self.phase = Phase::Idle;
        BitEvent::Fault(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::IoBuf;
    use serwire_hal::Level;

    fn config() -> I2cConfig {
        I2cConfig {
            divisor: 2,
            stretch_timeout: 10,
            settle_ticks: 2,
        }
    }

    /// Run one symbol against a fixed external bus
    fn run(tx: &mut I2cBitTx, symbol: Symbol, external: I2cLines) -> (BitEvent, u32) {
        let mut io = IoBuf::new();
        tx.begin(symbol).unwrap();
        io.set(tx.drive());
        for tick in 1..200 {
            let event = tx.tick(io.resolve(external));
            io.set(tx.drive());
            if !matches!(event, BitEvent::Busy) {
                return (event, tick);
            }
        }
        panic!("symbol never finished");
    }

    #[test]
    fn test_bit_takes_four_phases() {
        let mut tx = I2cBitTx::new(&config());
        let (event, ticks) = run(&mut tx, Symbol::Drive(false), I2cLines::IDLE);
        assert_eq!(event, BitEvent::Done(false));
        assert_eq!(ticks, 8);
        assert_eq!(tx.drive().scl, Drive::Low);
    }

    #[test]
    fn test_release_samples_target() {
        let mut tx = I2cBitTx::new(&config());
        let ext = I2cLines {
            scl: Level::High,
            sda: Level::Low,
        };
        let (event, _) = run(&mut tx, Symbol::Release, ext);
        assert_eq!(event, BitEvent::Done(false));
    }

    #[test]
    fn test_contention_is_bus_fault() {
        let mut tx = I2cBitTx::new(&config());
        let ext = I2cLines {
            scl: Level::High,
            sda: Level::Low,
        };
        let (event, _) = run(&mut tx, Symbol::Drive(true), ext);
        assert_eq!(event, BitEvent::Fault(ErrorKind::BusFault));
        assert!(tx.drive().is_released());
    }

    #[test]
    fn test_start_on_busy_bus_is_bus_fault() {
        let mut tx = I2cBitTx::new(&config());
        let ext = I2cLines {
            scl: Level::High,
            sda: Level::Low,
        };
        let (event, _) = run(&mut tx, Symbol::Start, ext);
        assert_eq!(event, BitEvent::Fault(ErrorKind::BusFault));
    }

    #[test]
    fn test_start_leaves_lines_low() {
        let mut tx = I2cBitTx::new(&config());
        let (event, _) = run(&mut tx, Symbol::Start, I2cLines::IDLE);
        assert_eq!(event, BitEvent::Done(true));
        assert_eq!(tx.drive().sda, Drive::Low);
        assert_eq!(tx.drive().scl, Drive::Low);
    }

    #[test]
    fn test_stop_releases_both_lines() {
        let mut tx = I2cBitTx::new(&config());
        let (event, _) = run(&mut tx, Symbol::Stop, I2cLines::IDLE);
        assert_eq!(event, BitEvent::Done(true));
        assert!(tx.drive().is_released());
    }

    #[test]
    fn test_stretch_timeout() {
        let mut tx = I2cBitTx::new(&config());
        let ext = I2cLines {
            scl: Level::Low,
            sda: Level::High,
        };
        let (event, _) = run(&mut tx, Symbol::Drive(true), ext);
        assert_eq!(event, BitEvent::Fault(ErrorKind::Timeout));
        assert!(tx.drive().is_released());
    }

    #[test]
    fn test_unknown_sda_is_line_fault() {
        let mut tx = I2cBitTx::new(&config());
        let ext = I2cLines {
            scl: Level::High,
            sda: Level::Unknown,
        };
        let (event, _) = run(&mut tx, Symbol::Release, ext);
        assert_eq!(event, BitEvent::Fault(ErrorKind::LineFault));
    }

    #[test]
    fn test_foreign_stop_during_rise_is_bus_fault() {
        let cfg = I2cConfig {
            divisor: 4,
            ..config()
        };
        let mut tx = I2cBitTx::new(&cfg);
        let mut io = IoBuf::new();
        let mut ext = I2cLines {
            scl: Level::High,
            sda: Level::Low,
        };

        // Finish one bit so SCL starts the next symbol low
        tx.begin(Symbol::Drive(false)).unwrap();
        io.set(tx.drive());
        while tx.tick(io.resolve(ext)) == BitEvent::Busy {
            io.set(tx.drive());
        }
        io.set(tx.drive());
        assert_eq!(tx.drive().scl, Drive::Low);

        tx.begin(Symbol::Release).unwrap();
        io.set(tx.drive());
        let mut scl_was_high = false;
        let mut event = BitEvent::Busy;
        for _ in 0..50 {
            if scl_was_high {
                // Another party lets SDA rise while SCL is high
                ext.sda = Level::High;
            }
            let lines = io.resolve(ext);
            event = tx.tick(lines);
            io.set(tx.drive());
            if event != BitEvent::Busy {
                break;
            }
            if lines.scl.is_high() {
                scl_was_high = true;
            }
        }
        assert_eq!(event, BitEvent::Fault(ErrorKind::BusFault));
        assert!(tx.drive().is_released());
    }

    #[test]
    fn test_begin_while_busy_rejected() {
        let mut tx = I2cBitTx::new(&config());
        tx.begin(Symbol::Release).unwrap();
        assert_eq!(tx.begin(Symbol::Release), Err(ErrorKind::Busy));
    }
}
