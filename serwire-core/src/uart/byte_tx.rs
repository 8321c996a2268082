//! UART frame transmit engine
//!
//! Wraps a data word in start, parity and stop bits and feeds the frame
//! to the bit engine LSB first.

use serwire_hal::UartConfig;

use super::bit_tx::UartBitTx;
use crate::error::ErrorKind;

/// Frame serializer
#[derive(Debug, Clone)]
pub struct UartByteTx {
    /// Frame bits, LSB is sent first
    frame: u16,
    len: u8,
    pos: u8,
    active: bool,
}

impl UartByteTx {
    /// Create an idle serializer
    pub fn new() -> Self {
        Self {
            frame: 0,
            len: 0,
            pos: 0,
            active: false,
        }
    }

    /// Check if a frame is on the line
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start sending `word`; the start bit begins on this tick
    ///
    /// Rejected with [`ErrorKind::Busy`] while a frame is on the line.
    pub fn load(
        &mut self,
        word: u16,
        config: &UartConfig,
        bits: &mut UartBitTx,
    ) -> Result<(), ErrorKind> {
        if self.active {
            return Err(ErrorKind::Busy);
        }
        let data = word & config.data_mask();
        let n = config.data_bits.count();

        // start bit is a 0 at position 0
        let mut frame = data << 1;
        let mut len = 1 + n;
        if let Some(parity) = config.parity.bit_for(data) {
            frame |= (parity as u16) << len;
            len += 1;
        }
        for _ in 0..config.stop_bits.count() {
            frame |= 1 << len;
            len += 1;
        }

        self.frame = frame;
        self.len = len;
        self.pos = 0;
        self.active = true;
        bits.send(false);
        Ok(())
    }

    /// Advance one reference tick
    ///
    /// Returns true on the tick the last stop bit ends.
    pub fn tick(&mut self, bits: &mut UartBitTx) -> bool {
        if !self.active || !bits.tick() {
            return false;
        }
        self.pos += 1;
        if self.pos < self.len {
            bits.send((self.frame >> self.pos) & 1 != 0);
            false
        } else {
            bits.idle();
            self.active = false;
            true
        }
    }
}

impl Default for UartByteTx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serwire_hal::{DataBits, Level, Parity, StopBits};

    /// Collect the level of each bit period
    fn frame_levels(word: u16, config: &UartConfig) -> heapless::Vec<bool, 16> {
        let mut bits = UartBitTx::new(config.divisor);
        let mut tx = UartByteTx::new();
        tx.load(word, config, &mut bits).unwrap();
        let mut out = heapless::Vec::new();
        let mut tick = 0;
        loop {
            if tick % config.divisor as u32 == 0 {
                let _ = out.push(bits.level() == Level::High);
            }
            tick += 1;
            if tx.tick(&mut bits) {
                break;
            }
        }
        out
    }

    #[test]
    fn test_8n1_frame() {
        let cfg = UartConfig {
            divisor: 4,
            ..UartConfig::default()
        };
        let levels = frame_levels(0x35, &cfg);
        assert_eq!(
            &levels[..],
            &[false, true, false, true, false, true, true, false, false, true]
        );
    }

    #[test]
    fn test_7e2_frame() {
        let cfg = UartConfig {
            divisor: 4,
            data_bits: DataBits::Seven,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            ..UartConfig::default()
        };
        // 0x03 has two ones: even parity bit is 0
        let levels = frame_levels(0x03, &cfg);
        assert_eq!(levels.len(), 11);
        assert!(!levels[8]);
        assert!(levels[9] && levels[10]);
    }

    #[test]
    fn test_load_while_active_rejected() {
        let cfg = UartConfig::default();
        let mut bits = UartBitTx::new(cfg.divisor);
        let mut tx = UartByteTx::new();
        tx.load(1, &cfg, &mut bits).unwrap();
        assert_eq!(tx.load(2, &cfg, &mut bits), Err(ErrorKind::Busy));
    }
}
