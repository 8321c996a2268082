//! Bit-banged SPI on four push-pull pins

use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;
use serwire_core::spi::{SpiController, SpiOutputs};
use serwire_core::transfer::MAX_TRANSFER_LEN;
use serwire_core::{Direction, ErrorKind, TransferController, TransferStatus};
use serwire_hal::{Level, SpiBus, SpiConfig, TickSource};

use crate::error::DriverError;

/// SPI controller on GPIO pins
///
/// Each bus call is one chip-select assertion.
pub struct PinSpi<SCLK, MOSI, MISO, CS, T> {
    sclk: SCLK,
    mosi: MOSI,
    miso: MISO,
    cs: CS,
    tick: T,
    ctrl: SpiController,
}

impl<SCLK, MOSI, MISO, CS, T, E> PinSpi<SCLK, MOSI, MISO, CS, T>
where
    SCLK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
    CS: OutputPin<Error = E>,
    T: TickSource,
{
    /// Create a driver, putting SCLK at its idle level and deselecting
    pub fn new(
        sclk: SCLK,
        mosi: MOSI,
        miso: MISO,
        cs: CS,
        tick: T,
        config: SpiConfig,
    ) -> Result<Self, E> {
        let mut spi = Self {
            sclk,
            mosi,
            miso,
            cs,
            tick,
            ctrl: SpiController::new(config),
        };
        let idle = spi.ctrl.outputs();
        spi.apply(idle)?;
        Ok(spi)
    }

    /// The underlying controller
    pub fn controller(&self) -> &SpiController {
        &self.ctrl
    }

    /// Change mode, bit order, word size or clock rate
    pub fn configure(&mut self, config: SpiConfig) -> Result<(), DriverError<E>> {
        self.ctrl.configure(config)?;
        let idle = self.ctrl.outputs();
        self.apply(idle).map_err(DriverError::Pin)
    }

    /// Release the pins and the tick source
    pub fn free(self) -> (SCLK, MOSI, MISO, CS, T) {
        (self.sclk, self.mosi, self.miso, self.cs, self.tick)
    }

    /// Run one transfer to completion, copying received bytes into `read`
    fn transact(
        &mut self,
        direction: Direction,
        data: &[u8],
        length: usize,
        read: &mut [u8],
    ) -> Result<(), DriverError<E>> {
        let handle = self.ctrl.submit_transfer((), direction, data, length)?;

        loop {
            self.step()?;
            match self.ctrl.poll_status(handle) {
                TransferStatus::Pending => {}
                TransferStatus::Done => break,
                TransferStatus::Failed(kind) => {
                    warn!("pin spi: transfer failed: {}", kind);
                    return Err(DriverError::Protocol(kind));
                }
                TransferStatus::Unknown => return Err(DriverError::Protocol(ErrorKind::Aborted)),
            }
        }

        if let Some(rx) = self.ctrl.received(handle) {
            let n = rx.len().min(read.len());
            read[..n].copy_from_slice(&rx[..n]);
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), DriverError<E>> {
        let miso = Level::from(self.miso.is_high().map_err(DriverError::Pin)?);
        let out = self.ctrl.tick(miso);
        self.apply(out).map_err(DriverError::Pin)?;
        self.tick.wait_tick();
        Ok(())
    }

    fn apply(&mut self, out: SpiOutputs) -> Result<(), E> {
        // Data before clock so the level is stable at the edge
        set(&mut self.mosi, out.mosi)?;
        set(&mut self.sclk, out.sclk)?;
        set(&mut self.cs, out.cs)
    }
}

fn set<P: OutputPin>(pin: &mut P, level: Level) -> Result<(), P::Error> {
    if level.is_high() {
        pin.set_high()
    } else {
        pin.set_low()
    }
}

impl<SCLK, MOSI, MISO, CS, T, E> SpiBus for PinSpi<SCLK, MOSI, MISO, CS, T>
where
    SCLK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
    CS: OutputPin<Error = E>,
    T: TickSource,
{
    type Error = DriverError<E>;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.transact(Direction::Exchange, write, read.len(), read)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.transact(Direction::Write, data, data.len(), &mut [])
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.transact(Direction::Read, &[], buf.len(), buf)
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        let tx: Vec<u8, MAX_TRANSFER_LEN> =
            Vec::from_slice(data).map_err(|_| DriverError::Protocol(ErrorKind::TooLong))?;
        self.transact(Direction::Exchange, &tx, data.len(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use serwire_core::sim::spi::SpiPeer;
    use serwire_hal::Mode;
    use std::rc::Rc;

    struct Wire {
        out: SpiOutputs,
        peer: SpiPeer,
    }

    type Shared = Rc<RefCell<Wire>>;

    #[derive(Clone, Copy)]
    enum Role {
        Sclk,
        Mosi,
        Cs,
    }

    struct OutPin {
        wire: Shared,
        role: Role,
    }

    impl ErrorType for OutPin {
        type Error = Infallible;
    }

    impl OutputPin for OutPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.set_level(Level::Low);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.set_level(Level::High);
            Ok(())
        }
    }

    impl OutPin {
        fn set_level(&mut self, level: Level) {
            let mut wire = self.wire.borrow_mut();
            match self.role {
                Role::Sclk => wire.out.sclk = level,
                Role::Mosi => wire.out.mosi = level,
                Role::Cs => wire.out.cs = level,
            }
        }
    }

    struct MisoPin {
        wire: Shared,
    }

    impl ErrorType for MisoPin {
        type Error = Infallible;
    }

    impl InputPin for MisoPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.wire.borrow().peer.miso().is_high())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    /// Lets the peripheral react to each tick's outputs
    struct WireClock {
        wire: Shared,
        ticks: u64,
    }

    impl TickSource for WireClock {
        fn wait_tick(&mut self) {
            let wire = &mut *self.wire.borrow_mut();
            wire.peer.tick(wire.out);
            self.ticks += 1;
        }

        fn ticks(&self) -> u64 {
            self.ticks
        }
    }

    type Driver = PinSpi<OutPin, OutPin, MisoPin, OutPin, WireClock>;

    fn driver(mode: Mode, response: &[u16]) -> (Driver, Shared) {
        let config = SpiConfig {
            divisor: 2,
            mode,
            ..SpiConfig::default()
        };
        let peer = SpiPeer::new(mode, config.bit_order, config.word_bits).with_response(response);
        let wire = Rc::new(RefCell::new(Wire {
            out: SpiOutputs {
                sclk: Level::Low,
                mosi: Level::Low,
                cs: Level::High,
            },
            peer,
        }));
        let pin = |role| OutPin {
            wire: wire.clone(),
            role,
        };
        let spi = PinSpi::new(
            pin(Role::Sclk),
            pin(Role::Mosi),
            MisoPin { wire: wire.clone() },
            pin(Role::Cs),
            WireClock {
                wire: wire.clone(),
                ticks: 0,
            },
            config,
        )
        .unwrap();
        (spi, wire)
    }

    #[test]
    fn test_idle_levels_after_new() {
        let (_spi, wire) = driver(Mode::Mode2, &[]);
        let out = wire.borrow().out;
        assert!(out.sclk.is_high());
        assert!(!out.selected());
    }

    #[test]
    fn test_transfer_mode0() {
        let (mut spi, wire) = driver(Mode::Mode0, &[0x3C]);
        let mut read = [0u8; 1];
        spi.transfer(&mut read, &[0xA5]).unwrap();

        assert_eq!(read, [0x3C]);
        assert_eq!(wire.borrow().peer.received(), &[0xA5]);
        assert!(!wire.borrow().out.selected());
    }

    #[test]
    fn test_transfer_in_place_mode3() {
        let (mut spi, wire) = driver(Mode::Mode3, &[0x01, 0x80]);
        let mut data = [0xF0, 0x0F];
        spi.transfer_in_place(&mut data).unwrap();

        assert_eq!(data, [0x01, 0x80]);
        assert_eq!(wire.borrow().peer.received(), &[0xF0, 0x0F]);
        assert_eq!(wire.borrow().peer.selections(), 1);
    }

    #[test]
    fn test_write_then_read() {
        let (mut spi, wire) = driver(Mode::Mode1, &[0x00, 0x99]);
        spi.write(&[0x42]).unwrap();
        let mut buf = [0u8; 1];
        spi.read(&mut buf).unwrap();

        assert_eq!(buf, [0x99]);
        assert_eq!(wire.borrow().peer.selections(), 2);
        assert_eq!(spi.controller().last_cycles(), 8);
    }

    #[test]
    fn test_oversized_rejected() {
        let (mut spi, wire) = driver(Mode::Mode0, &[]);
        let data = [0u8; MAX_TRANSFER_LEN + 1];
        let err = spi.write(&data).unwrap_err();
        assert_eq!(err, DriverError::Protocol(ErrorKind::TooLong));
        assert_eq!(wire.borrow().peer.selections(), 0);
    }
}
