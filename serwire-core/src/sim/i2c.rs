//! I2C target model
//!
//! A scripted target device that acknowledges its address, records what
//! it sees and can NACK or stretch the clock on demand. It reacts to SCL
//! edges the way a real target does: it samples SDA on rising edges and
//! changes SDA only while SCL is low.

use heapless::Vec;
use serwire_hal::{Address, Drive};

use crate::i2c::{I2cController, I2cDrive, I2cLines};

/// Capacity of the event log
pub const EVENT_CAPACITY: usize = 64;

/// Something the target observed on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetEvent {
    /// START or repeated START
    Start,
    /// STOP
    Stop,
    /// Address byte (head or 10-bit tail), whether or not it matched
    Address(u8),
    /// Data byte written by the controller
    Write(u8),
    /// Data byte read by the controller
    Read(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetState {
    Idle,
    Addr { shift: u8, count: u8 },
    Tail { shift: u8, count: u8 },
    AddrAck { read: bool, tail: bool, driving: bool },
    Write { shift: u8, count: u8 },
    WriteAck { ack: bool, driving: bool },
    Read { byte: u8, count: u8 },
    ReadAck { acked: bool },
    Ignore,
}

/// Scripted I2C target
#[derive(Debug, Clone)]
pub struct I2cTarget {
    address: Address,
    drive: I2cDrive,
    prev: I2cLines,
    state: TargetState,
    ten_bit_selected: bool,
    read_data: Vec<u8, EVENT_CAPACITY>,
    read_pos: usize,
    nack_after: Option<usize>,
    written: usize,
    stretch: u32,
    hold: u32,
    events: Vec<TargetEvent, EVENT_CAPACITY>,
    read_acks: Vec<bool, EVENT_CAPACITY>,
}

impl I2cTarget {
    /// Create a target answering at `address`
    pub fn new(address: Address) -> Self {
        Self {
            address,
            drive: I2cDrive::RELEASED,
            prev: I2cLines::IDLE,
            state: TargetState::Idle,
            ten_bit_selected: false,
            read_data: Vec::new(),
            read_pos: 0,
            nack_after: None,
            written: 0,
            stretch: 0,
            hold: 0,
            events: Vec::new(),
            read_acks: Vec::new(),
        }
    }

    /// Bytes returned to reads, in order; 0xFF once exhausted
    pub fn with_read_data(mut self, data: &[u8]) -> Self {
        self.read_data = Vec::from_slice(data).unwrap_or_default();
        self
    }

    /// Acknowledge the first `count` written data bytes, NACK the rest
    pub fn nack_after(mut self, count: usize) -> Self {
        self.nack_after = Some(count);
        self
    }

    /// Hold SCL low for `ticks` after every acknowledged byte
    pub fn stretch(mut self, ticks: u32) -> Self {
        self.stretch = ticks;
        self
    }

    /// Change the stretch length
    pub fn set_stretch(&mut self, ticks: u32) {
        self.stretch = ticks;
    }

    /// What the target drives
    pub fn drive(&self) -> I2cDrive {
        self.drive
    }

    /// Everything observed so far
    pub fn events(&self) -> &[TargetEvent] {
        &self.events
    }

    /// Controller ack bits seen after each byte read
    pub fn read_acks(&self) -> &[bool] {
        &self.read_acks
    }

    /// React to one reference tick of resolved bus levels
    pub fn tick(&mut self, lines: I2cLines) -> I2cDrive {
        let prev = self.prev;
        self.prev = lines;

        if self.hold > 0 {
            self.hold -= 1;
            if self.hold == 0 {
                self.drive.scl = Drive::Release;
            }
        }

        if prev.scl.is_high() && lines.scl.is_high() {
            if prev.sda.is_high() && lines.sda.is_low() {
                self.log(TargetEvent::Start);
                self.drive.sda = Drive::Release;
                self.state = TargetState::Addr { shift: 0, count: 0 };
                return self.drive;
            }
            if prev.sda.is_low() && lines.sda.is_high() {
                self.log(TargetEvent::Stop);
                self.drive.sda = Drive::Release;
                self.ten_bit_selected = false;
                self.state = TargetState::Idle;
                return self.drive;
            }
        }

        if prev.scl.is_low() && lines.scl.is_high() {
            self.on_rise(lines.sda.is_high());
        } else if prev.scl.is_high() && lines.scl.is_low() {
            self.on_fall();
        }
        self.drive
    }

    fn on_rise(&mut self, sda: bool) {
        let state = self.state;
        self.state = match state {
            TargetState::Addr { shift, count } => {
                let shift = (shift << 1) | sda as u8;
                if count + 1 < 8 {
                    TargetState::Addr {
                        shift,
                        count: count + 1,
                    }
                } else {
                    self.log(TargetEvent::Address(shift));
                    self.match_head(shift)
                }
            }
            TargetState::Tail { shift, count } => {
                let shift = (shift << 1) | sda as u8;
                if count + 1 < 8 {
                    TargetState::Tail {
                        shift,
                        count: count + 1,
                    }
                } else {
                    self.log(TargetEvent::Address(shift));
                    match self.address {
                        Address::TenBit(a) if a as u8 == shift => {
                            self.ten_bit_selected = true;
                            TargetState::AddrAck {
                                read: false,
                                tail: false,
                                driving: false,
                            }
                        }
                        _ => TargetState::Ignore,
                    }
                }
            }
            TargetState::Write { shift, count } => {
                let shift = (shift << 1) | sda as u8;
                if count + 1 < 8 {
                    TargetState::Write {
                        shift,
                        count: count + 1,
                    }
                } else {
                    self.log(TargetEvent::Write(shift));
                    self.written += 1;
                    let ack = self.nack_after.map_or(true, |n| self.written <= n);
                    TargetState::WriteAck {
                        ack,
                        driving: false,
                    }
                }
            }
            TargetState::ReadAck { .. } => {
                let acked = !sda;
                let _ = self.read_acks.push(acked);
                TargetState::ReadAck { acked }
            }
            other => other,
        };
    }

    fn on_fall(&mut self) {
        let state = self.state;
        self.state = match state {
            TargetState::AddrAck {
                read,
                tail,
                driving: false,
            } => {
                self.drive.sda = Drive::Low;
                TargetState::AddrAck {
                    read,
                    tail,
                    driving: true,
                }
            }
            TargetState::AddrAck { read, tail, .. } => {
                self.drive.sda = Drive::Release;
                self.begin_hold();
                if read {
                    self.next_read()
                } else if tail {
                    TargetState::Tail { shift: 0, count: 0 }
                } else {
                    TargetState::Write { shift: 0, count: 0 }
                }
            }
            TargetState::WriteAck {
                ack,
                driving: false,
            } => {
                self.drive.sda = if ack { Drive::Low } else { Drive::Release };
                TargetState::WriteAck { ack, driving: true }
            }
            TargetState::WriteAck { ack, .. } => {
                self.drive.sda = Drive::Release;
                if ack {
                    self.begin_hold();
                    TargetState::Write { shift: 0, count: 0 }
                } else {
                    TargetState::Ignore
                }
            }
            TargetState::Read { byte, count } => {
                let count = count + 1;
                if count < 8 {
                    self.drive.sda = bit_drive(byte & (0x80 >> count) != 0);
                    TargetState::Read { byte, count }
                } else {
                    self.log(TargetEvent::Read(byte));
                    self.drive.sda = Drive::Release;
                    TargetState::ReadAck { acked: false }
                }
            }
            TargetState::ReadAck { acked: true } => self.next_read(),
            TargetState::ReadAck { acked: false } => {
                self.drive.sda = Drive::Release;
                TargetState::Ignore
            }
            other => other,
        };
    }

    fn match_head(&self, byte: u8) -> TargetState {
        let read = byte & 1 == 1;
        match self.address {
            Address::SevenBit(a) if byte >> 1 == a => TargetState::AddrAck {
                read,
                tail: false,
                driving: false,
            },
            Address::TenBit(a)
                if byte & 0xF8 == 0xF0 && ((byte >> 1) & 0b11) as u16 == a >> 8 =>
            {
                if !read {
                    TargetState::AddrAck {
                        read: false,
                        tail: true,
                        driving: false,
                    }
                } else if self.ten_bit_selected {
                    TargetState::AddrAck {
                        read: true,
                        tail: false,
                        driving: false,
                    }
                } else {
                    TargetState::Ignore
                }
            }
            _ => TargetState::Ignore,
        }
    }

    /// Present the MSB of the next read byte
    fn next_read(&mut self) -> TargetState {
        let byte = self.read_data.get(self.read_pos).copied().unwrap_or(0xFF);
        self.read_pos += 1;
        self.drive.sda = bit_drive(byte & 0x80 != 0);
        TargetState::Read { byte, count: 0 }
    }

    fn begin_hold(&mut self) {
        if self.stretch > 0 {
            self.hold = self.stretch;
            self.drive.scl = Drive::Low;
        }
    }

    fn log(&mut self, event: TargetEvent) {
        let _ = self.events.push(event);
    }
}

fn bit_drive(bit: bool) -> Drive {
    if bit {
        Drive::Release
    } else {
        Drive::Low
    }
}

/// Step a controller and a target through one reference tick
///
/// Both observe the same resolved bus, computed from the drives of the
/// previous tick. Returns that bus.
pub fn step(ctrl: &mut I2cController, target: &mut I2cTarget) -> I2cLines {
    let external = target.drive().levels();
    let lines = ctrl.io().resolve(external);
    ctrl.tick(external);
    target.tick(lines);
    lines
}
