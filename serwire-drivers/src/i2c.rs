//! Bit-banged I2C on two open-drain pins
//!
//! Each pin must be configured open-drain with a pull-up: `set_low` pulls
//! the line down, `set_high` releases it, and `is_high` reads the resolved
//! bus level back, our own drive included.

use embedded_hal::digital::{InputPin, OutputPin};
use serwire_core::i2c::{I2cController, I2cDrive, I2cLines, I2cState};
use serwire_core::{Direction, ErrorKind, TransferController, TransferStatus};
use serwire_hal::{Address, Drive, I2cBus, I2cConfig, Level, TickSource};

use crate::error::DriverError;

/// I2C controller on GPIO pins
pub struct PinI2c<SCL, SDA, T> {
    scl: SCL,
    sda: SDA,
    tick: T,
    ctrl: I2cController,
}

impl<SCL, SDA, T, E> PinI2c<SCL, SDA, T>
where
    SCL: InputPin<Error = E> + OutputPin<Error = E>,
    SDA: InputPin<Error = E> + OutputPin<Error = E>,
    T: TickSource,
{
    /// Create a driver; the pins are released on the first tick
    pub fn new(scl: SCL, sda: SDA, tick: T, config: I2cConfig) -> Self {
        Self {
            scl,
            sda,
            tick,
            ctrl: I2cController::new(config),
        }
    }

    /// The underlying controller
    pub fn controller(&self) -> &I2cController {
        &self.ctrl
    }

    /// Change the bus timing
    pub fn configure(&mut self, config: I2cConfig) -> Result<(), DriverError<E>> {
        self.ctrl.configure(config).map_err(DriverError::Protocol)
    }

    /// Release the pins and the tick source
    pub fn free(self) -> (SCL, SDA, T) {
        (self.scl, self.sda, self.tick)
    }

    /// Run one transfer to completion
    fn transact(
        &mut self,
        address: Address,
        direction: Direction,
        data: &[u8],
        read: &mut [u8],
    ) -> Result<(), DriverError<E>> {
        let length = match direction {
            Direction::Write => data.len(),
            Direction::Read | Direction::Exchange => read.len(),
        };
        let handle = self
            .ctrl
            .submit_transfer(address, direction, data, length)?;

        loop {
            self.step()?;
            match self.ctrl.poll_status(handle) {
                TransferStatus::Pending => {}
                TransferStatus::Done => break,
                TransferStatus::Failed(kind) => {
                    warn!("pin i2c: transfer failed: {}", kind);
                    if matches!(self.ctrl.state(), I2cState::Error(_)) {
                        self.ctrl.reset();
                    }
                    return Err(DriverError::Protocol(kind));
                }
                // Only this driver submits, so the outcome is never evicted
                TransferStatus::Unknown => return Err(DriverError::Protocol(ErrorKind::Aborted)),
            }
        }

        if let Some(rx) = self.ctrl.received(handle) {
            let n = rx.len().min(read.len());
            read[..n].copy_from_slice(&rx[..n]);
        }
        Ok(())
    }

    /// Sample the bus, step the controller, drive the pins, wait a tick
    fn step(&mut self) -> Result<(), DriverError<E>> {
        let lines = I2cLines {
            scl: Level::from(self.scl.is_high().map_err(DriverError::Pin)?),
            sda: Level::from(self.sda.is_high().map_err(DriverError::Pin)?),
        };
        let drive = self.ctrl.tick(lines);
        self.apply(drive).map_err(DriverError::Pin)?;
        self.tick.wait_tick();
        Ok(())
    }

    fn apply(&mut self, drive: I2cDrive) -> Result<(), E> {
        match drive.scl {
            Drive::Low => self.scl.set_low()?,
            Drive::Release => self.scl.set_high()?,
        }
        match drive.sda {
            Drive::Low => self.sda.set_low(),
            Drive::Release => self.sda.set_high(),
        }
    }
}

impl<SCL, SDA, T, E> I2cBus for PinI2c<SCL, SDA, T>
where
    SCL: InputPin<Error = E> + OutputPin<Error = E>,
    SDA: InputPin<Error = E> + OutputPin<Error = E>,
    T: TickSource,
{
    type Error = DriverError<E>;

    fn write(&mut self, address: Address, data: &[u8]) -> Result<(), Self::Error> {
        self.transact(address, Direction::Write, data, &mut [])
    }

    fn read(&mut self, address: Address, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.transact(address, Direction::Read, &[], buf)
    }

    fn write_read(
        &mut self,
        address: Address,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.transact(address, Direction::Exchange, write_data, read_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use serwire_core::sim::i2c::{I2cTarget, TargetEvent};
    use serwire_hal::line::wired_and;
    use std::rc::Rc;

    /// Two-wire bus shared by the mock pins and the simulated target
    ///
    /// Pin writes land in `next` and take effect on the following tick,
    /// so the target and the controller see the same levels each tick.
    struct Bus {
        now: I2cDrive,
        next: I2cDrive,
        target: I2cTarget,
    }

    impl Bus {
        fn lines(&self) -> I2cLines {
            let theirs = self.target.drive();
            I2cLines {
                scl: wired_and([self.now.scl.level(), theirs.scl.level()]),
                sda: wired_and([self.now.sda.level(), theirs.sda.level()]),
            }
        }
    }

    type Shared = Rc<RefCell<Bus>>;

    #[derive(Clone, Copy)]
    enum Line {
        Scl,
        Sda,
    }

    struct MockPin {
        bus: Shared,
        line: Line,
    }

    impl MockPin {
        fn set(&mut self, drive: Drive) {
            let mut bus = self.bus.borrow_mut();
            match self.line {
                Line::Scl => bus.next.scl = drive,
                Line::Sda => bus.next.sda = drive,
            }
        }
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.set(Drive::Low);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.set(Drive::Release);
            Ok(())
        }
    }

    impl InputPin for MockPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            let lines = self.bus.borrow().lines();
            let level = match self.line {
                Line::Scl => lines.scl,
                Line::Sda => lines.sda,
            };
            Ok(level.is_high())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    /// Steps the target once per tick
    struct BusClock {
        bus: Shared,
        ticks: u64,
    }

    impl TickSource for BusClock {
        fn wait_tick(&mut self) {
            let bus = &mut *self.bus.borrow_mut();
            let lines = bus.lines();
            bus.target.tick(lines);
            bus.now = bus.next;
            self.ticks += 1;
        }

        fn ticks(&self) -> u64 {
            self.ticks
        }
    }

    fn config() -> I2cConfig {
        I2cConfig {
            divisor: 2,
            stretch_timeout: 40,
            settle_ticks: 2,
        }
    }

    fn driver(target: I2cTarget) -> (PinI2c<MockPin, MockPin, BusClock>, Shared) {
        let bus = Rc::new(RefCell::new(Bus {
            now: I2cDrive::RELEASED,
            next: I2cDrive::RELEASED,
            target,
        }));
        let scl = MockPin {
            bus: bus.clone(),
            line: Line::Scl,
        };
        let sda = MockPin {
            bus: bus.clone(),
            line: Line::Sda,
        };
        let clock = BusClock {
            bus: bus.clone(),
            ticks: 0,
        };
        (PinI2c::new(scl, sda, clock, config()), bus)
    }

    #[test]
    fn test_write() {
        let (mut i2c, bus) = driver(I2cTarget::new(Address::SevenBit(0x50)));
        i2c.write(Address::SevenBit(0x50), &[0x12, 0x34]).unwrap();

        assert_eq!(
            bus.borrow().target.events(),
            &[
                TargetEvent::Start,
                TargetEvent::Address(0xA0),
                TargetEvent::Write(0x12),
                TargetEvent::Write(0x34),
                TargetEvent::Stop,
            ]
        );
        assert!(bus.borrow().lines().is_idle());
    }

    #[test]
    fn test_write_read() {
        let target = I2cTarget::new(Address::SevenBit(0x50)).with_read_data(&[0xDE, 0xAD]);
        let (mut i2c, bus) = driver(target);
        let mut buf = [0u8; 2];
        i2c.write_read(Address::SevenBit(0x50), &[0x10], &mut buf)
            .unwrap();

        assert_eq!(buf, [0xDE, 0xAD]);
        assert_eq!(bus.borrow().target.read_acks(), &[true, false]);
    }

    #[test]
    fn test_read() {
        let target = I2cTarget::new(Address::SevenBit(0x50)).with_read_data(&[0x7E]);
        let (mut i2c, bus) = driver(target);
        let mut buf = [0u8; 1];
        i2c.read(Address::SevenBit(0x50), &mut buf).unwrap();

        assert_eq!(buf, [0x7E]);
        assert_eq!(bus.borrow().target.read_acks(), &[false]);
    }

    #[test]
    fn test_nack_resets_controller() {
        let (mut i2c, _bus) = driver(I2cTarget::new(Address::SevenBit(0x50)));
        let err = i2c.write(Address::SevenBit(0x51), &[0x00]).unwrap_err();
        assert_eq!(err, DriverError::Protocol(ErrorKind::Nack));
        assert_eq!(i2c.controller().state(), I2cState::Idle);

        // Usable again after the failure
        i2c.write(Address::SevenBit(0x50), &[0x01]).unwrap();
    }

    #[test]
    fn test_rejected_request() {
        let (mut i2c, _bus) = driver(I2cTarget::new(Address::SevenBit(0x50)));
        let err = i2c.read(Address::SevenBit(0x50), &mut []).unwrap_err();
        assert_eq!(err, DriverError::Protocol(ErrorKind::Unsupported));
    }

    #[test]
    fn test_ticks_counted() {
        let (mut i2c, _bus) = driver(I2cTarget::new(Address::SevenBit(0x50)));
        i2c.write(Address::SevenBit(0x50), &[]).unwrap();
        let (_, _, clock) = i2c.free();
        assert!(clock.ticks() > 0);
    }
}
