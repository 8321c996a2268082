//! Bit-banged UART on a TX and an RX pin
//!
//! Both halves are stepped on every tick, so bytes arriving while a
//! write is in progress are kept in the RX FIFO.

use embedded_hal::digital::{InputPin, OutputPin};
use serwire_core::uart::{Uart, UartFlags};
use serwire_core::ErrorKind;
use serwire_hal::{Level, TickSource, UartConfig, UartRx, UartTx};

use crate::error::DriverError;

/// UART on GPIO pins
pub struct PinUart<TX, RX, T> {
    tx: TX,
    rx: RX,
    tick: T,
    uart: Uart,
    timeout: Option<u32>,
}

impl<TX, RX, T, E> PinUart<TX, RX, T>
where
    TX: OutputPin<Error = E>,
    RX: InputPin<Error = E>,
    T: TickSource,
{
    /// Create a driver and put TX at the idle (mark) level
    ///
    /// Reads block until data arrives; see [`with_timeout`](Self::with_timeout).
    pub fn new(mut tx: TX, rx: RX, tick: T, config: UartConfig) -> Result<Self, E> {
        tx.set_high()?;
        Ok(Self {
            tx,
            rx,
            tick,
            uart: Uart::new(config),
            timeout: None,
        })
    }

    /// Give up a read after `ticks` ticks without a new word
    pub fn with_timeout(mut self, ticks: u32) -> Self {
        self.timeout = Some(ticks);
        self
    }

    /// The underlying UART
    pub fn uart(&self) -> &Uart {
        &self.uart
    }

    /// Change the frame format; rejected while a frame is in flight
    pub fn configure(&mut self, config: UartConfig) -> Result<(), DriverError<E>> {
        self.uart.configure(config).map_err(DriverError::Protocol)
    }

    /// Release the pins and the tick source
    pub fn free(self) -> (TX, RX, T) {
        (self.tx, self.rx, self.tick)
    }

    fn step(&mut self) -> Result<(), DriverError<E>> {
        let rx = Level::from(self.rx.is_high().map_err(DriverError::Pin)?);
        let tx = self.uart.tick(rx);
        if tx.is_high() {
            self.tx.set_high().map_err(DriverError::Pin)?;
        } else {
            self.tx.set_low().map_err(DriverError::Pin)?;
        }
        self.tick.wait_tick();
        Ok(())
    }
}

impl<TX, RX, T, E> UartTx for PinUart<TX, RX, T>
where
    TX: OutputPin<Error = E>,
    RX: InputPin<Error = E>,
    T: TickSource,
{
    type Error = DriverError<E>;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for &byte in data {
            while self.uart.write(byte as u16).is_err() {
                self.step()?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        while self.uart.status().contains(UartFlags::TX_BUSY) {
            self.step()?;
        }
        Ok(())
    }
}

impl<TX, RX, T, E> UartRx for PinUart<TX, RX, T>
where
    TX: OutputPin<Error = E>,
    RX: InputPin<Error = E>,
    T: TickSource,
{
    type Error = DriverError<E>;

    /// Fill `buf` completely
    ///
    /// A framing or parity error on any word ends the read with that
    /// error. Words dropped on overrun are reported once, before any data.
    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let status = self.uart.take_status();
        if status.contains(UartFlags::OVERRUN) {
            warn!("pin uart: receive overrun");
            return Err(DriverError::Protocol(ErrorKind::Overrun));
        }

        for slot in buf.iter_mut() {
            let mut waited = 0u32;
            let word = loop {
                if let Some(word) = self.uart.read() {
                    break word;
                }
                if self.timeout.is_some_and(|limit| waited >= limit) {
                    return Err(DriverError::Timeout);
                }
                self.step()?;
                waited += 1;
            };
            if let Some(kind) = word.error() {
                return Err(DriverError::Protocol(kind));
            }
            *slot = word.data as u8;
        }
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use serwire_core::sim::uart::FrameWave;
    use serwire_core::sim::VirtualClock;
    use serwire_hal::Parity;
    use std::rc::Rc;

    /// Both ends of one wire
    #[derive(Clone)]
    struct WirePin(Rc<Cell<bool>>);

    impl ErrorType for WirePin {
        type Error = Infallible;
    }

    impl OutputPin for WirePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.set(true);
            Ok(())
        }
    }

    impl InputPin for WirePin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }
    }

    /// RX pin replaying a prepared waveform, idle once it runs out
    struct WavePin(FrameWave);

    impl ErrorType for WavePin {
        type Error = Infallible;
    }

    impl InputPin for WavePin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.next().map_or(true, |level| level.is_high()))
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    fn config() -> UartConfig {
        UartConfig {
            divisor: 4,
            ..UartConfig::default()
        }
    }

    fn loopback() -> (PinUart<WirePin, WirePin, VirtualClock>, Rc<Cell<bool>>) {
        let wire = Rc::new(Cell::new(false));
        let uart = PinUart::new(
            WirePin(wire.clone()),
            WirePin(wire.clone()),
            VirtualClock::new(),
            config(),
        )
        .unwrap()
        .with_timeout(200);
        (uart, wire)
    }

    #[test]
    fn test_new_idles_tx_high() {
        let (_uart, wire) = loopback();
        assert!(wire.get());
    }

    #[test]
    fn test_loopback_bytes() {
        let (mut uart, _wire) = loopback();
        uart.write_blocking(b"hi!").unwrap();
        uart.flush().unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(uart.read_blocking(&mut buf), Ok(3));
        assert_eq!(&buf, b"hi!");
    }

    #[test]
    fn test_read_times_out() {
        let (mut uart, _wire) = loopback();
        assert_eq!(uart.read_byte(), Err(DriverError::Timeout));
        let (_, _, clock) = uart.free();
        assert_eq!(clock.ticks(), 200);
    }

    #[test]
    fn test_overrun_reported_once() {
        let (mut uart, _wire) = loopback();
        let data = [0x30u8; 18];
        uart.write_blocking(&data).unwrap();
        uart.flush().unwrap();

        assert_eq!(
            uart.read_byte(),
            Err(DriverError::Protocol(ErrorKind::Overrun))
        );
        let mut buf = [0u8; 16];
        assert_eq!(uart.read_blocking(&mut buf), Ok(16));
        assert_eq!(buf, [0x30; 16]);
    }

    #[test]
    fn test_parity_error() {
        let cfg = UartConfig {
            parity: Parity::Even,
            ..config()
        };
        let wave = FrameWave::new(&cfg, 0x55).with_flipped_parity();
        let sink = WirePin(Rc::new(Cell::new(true)));
        let mut uart = PinUart::new(sink, WavePin(wave), VirtualClock::new(), cfg)
            .unwrap()
            .with_timeout(500);

        assert_eq!(
            uart.read_byte(),
            Err(DriverError::Protocol(ErrorKind::Parity))
        );
    }
}
