//! Configuration record
//!
//! One record carries the configuration of every engine and the busy
//! policy, so a host can restore its controllers on boot.

use serde::{Deserialize, Serialize};
use serwire_hal::{
    ConfigError, ConfigStorage, I2cConfig, SpiConfig, StorageError, StorageKey, UartConfig,
};

use crate::transfer::BusyPolicy;

/// Magic number identifying a configuration record
pub const RECORD_MAGIC: u32 = 0x5357_4346; // "SWCF"

/// Current record format version
pub const RECORD_VERSION: u8 = 1;

/// Largest serialized record
pub const MAX_RECORD_SIZE: usize = 96;

/// Record persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Storage operation failed
    Storage(StorageError),
    /// Serialization failed
    Encode,
    /// Deserialization failed
    Decode,
    /// Not a configuration record
    BadMagic,
    /// Record written by another format version
    Version(u8),
    /// CRC check failed
    CrcMismatch,
    /// A stored configuration does not validate
    Invalid(ConfigError),
}

impl From<StorageError> for RecordError {
    fn from(e: StorageError) -> Self {
        RecordError::Storage(e)
    }
}

impl From<ConfigError> for RecordError {
    fn from(e: ConfigError) -> Self {
        RecordError::Invalid(e)
    }
}

impl core::fmt::Display for RecordError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RecordError::Storage(e) => write!(f, "storage: {}", e),
            RecordError::Encode => f.write_str("record encoding failed"),
            RecordError::Decode => f.write_str("record decoding failed"),
            RecordError::BadMagic => f.write_str("not a configuration record"),
            RecordError::Version(v) => write!(f, "unsupported record version {}", v),
            RecordError::CrcMismatch => f.write_str("record CRC mismatch"),
            RecordError::Invalid(e) => write!(f, "invalid configuration: {}", e),
        }
    }
}

/// Configuration of all engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigRecord {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    pub i2c: I2cConfig,
    pub spi: SpiConfig,
    pub uart: UartConfig,
    /// Busy policy applied to every controller
    pub busy_policy: BusyPolicy,
    /// CRC32 over the encoded record with this field zeroed
    pub crc: u32,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self::new(
            I2cConfig::default(),
            SpiConfig::default(),
            UartConfig::default(),
            BusyPolicy::default(),
        )
    }
}

impl ConfigRecord {
    /// Create a record for the current format version
    pub fn new(i2c: I2cConfig, spi: SpiConfig, uart: UartConfig, busy_policy: BusyPolicy) -> Self {
        Self {
            magic: RECORD_MAGIC,
            version: RECORD_VERSION,
            i2c,
            spi,
            uart,
            busy_policy,
            crc: 0,
        }
    }

    /// Check that every configuration validates
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.i2c.validate()?;
        self.spi.validate()?;
        self.uart.validate()?;
        Ok(())
    }

    /// Calculate the CRC of the record (excluding the crc field itself)
    pub fn calculate_crc(&self) -> Result<u32, RecordError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let unsealed = Self { crc: 0, ..*self };
        let bytes = postcard::to_slice(&unsealed, &mut buffer).map_err(|_| RecordError::Encode)?;
        Ok(!crc32_update(0xFFFF_FFFF, bytes))
    }

    /// Serialize into `buffer`, updating the CRC first
    pub fn encode<'a>(&mut self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], RecordError> {
        self.crc = self.calculate_crc()?;
        postcard::to_slice(self, buffer).map_err(|_| RecordError::Encode)
    }

    /// Deserialize and check magic, version, CRC and contents
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let record: Self = postcard::from_bytes(bytes).map_err(|_| RecordError::Decode)?;
        if record.magic != RECORD_MAGIC {
            return Err(RecordError::BadMagic);
        }
        if record.version != RECORD_VERSION {
            warn!(
                "config: record version mismatch: found {}, expected {}",
                record.version, RECORD_VERSION
            );
            return Err(RecordError::Version(record.version));
        }
        if record.crc != record.calculate_crc()? {
            return Err(RecordError::CrcMismatch);
        }
        record.validate()?;
        Ok(record)
    }

    /// Store the record under [`StorageKey::Record`]
    pub fn save<S: ConfigStorage>(&mut self, storage: &mut S) -> Result<(), RecordError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let bytes = self.encode(&mut buffer)?;
        debug!("config: saving {} byte record", bytes.len());
        storage.write(StorageKey::Record, bytes)?;
        Ok(())
    }

    /// Load the record stored under [`StorageKey::Record`]
    pub fn load<S: ConfigStorage>(storage: &mut S) -> Result<Self, RecordError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let len = storage.read(StorageKey::Record, &mut buffer)?;
        Self::decode(&buffer[..len])
    }

    /// Load the stored record, falling back to defaults
    pub fn load_or_default<S: ConfigStorage>(storage: &mut S) -> Self {
        match Self::load(storage) {
            Ok(record) => record,
            Err(RecordError::Storage(StorageError::NotFound)) => {
                debug!("config: no stored record, using defaults");
                Self::default()
            }
            Err(_) => {
                warn!("config: stored record rejected, using defaults");
                Self::default()
            }
        }
    }
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;
    use serwire_hal::{Address, BitOrder, DataBits, Mode, Parity};

    /// Storage backed by one slot per key
    #[derive(Default)]
    struct MemStorage {
        slots: [Option<Vec<u8, MAX_RECORD_SIZE>>; 1],
    }

    impl ConfigStorage for MemStorage {
        fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, StorageError> {
            let data = self.slots[key.as_u8() as usize]
                .as_ref()
                .ok_or(StorageError::NotFound)?;
            if buffer.len() < data.len() {
                return Err(StorageError::BufferTooSmall);
            }
            buffer[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }

        fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StorageError> {
            let data = Vec::from_slice(data).map_err(|_| StorageError::Full)?;
            self.slots[key.as_u8() as usize] = Some(data);
            Ok(())
        }

        fn exists(&mut self, key: StorageKey) -> bool {
            self.slots[key.as_u8() as usize].is_some()
        }

        fn erase_all(&mut self) -> Result<(), StorageError> {
            self.slots = Default::default();
            Ok(())
        }
    }

    fn sample_record() -> ConfigRecord {
        let spi = SpiConfig {
            mode: Mode::Mode3,
            bit_order: BitOrder::LsbFirst,
            word_bits: 12,
            ..SpiConfig::default()
        };
        let uart = UartConfig {
            divisor: 104,
            data_bits: DataBits::Nine,
            parity: Parity::Even,
            ..UartConfig::default()
        };
        ConfigRecord::new(I2cConfig::with_divisor(25), spi, uart, BusyPolicy::Queue)
    }

    #[test]
    fn test_save_and_load() {
        let mut storage = MemStorage::default();
        let mut record = sample_record();
        record.save(&mut storage).unwrap();
        assert!(storage.exists(StorageKey::Record));

        let loaded = ConfigRecord::load(&mut storage).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.busy_policy, BusyPolicy::Queue);
        assert_ne!(loaded.crc, 0);
    }

    #[test]
    fn test_missing_record_falls_back_to_defaults() {
        let mut storage = MemStorage::default();
        assert_eq!(
            ConfigRecord::load(&mut storage),
            Err(RecordError::Storage(StorageError::NotFound))
        );
        assert_eq!(ConfigRecord::load_or_default(&mut storage), ConfigRecord::default());
    }

    #[test]
    fn test_corrupted_byte_rejected() {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let mut record = sample_record();
        let len = record.encode(&mut buffer).unwrap().len();
        // Flip a bit in the middle of the configuration payload
        buffer[len / 2] ^= 0x01;
        assert!(ConfigRecord::decode(&buffer[..len]).is_err());
    }

    #[test]
    fn test_wrong_magic_and_version() {
        let mut buffer = [0u8; MAX_RECORD_SIZE];

        let mut record = ConfigRecord {
            magic: 0x1234_5678,
            ..sample_record()
        };
        let len = record.encode(&mut buffer).unwrap().len();
        assert_eq!(ConfigRecord::decode(&buffer[..len]), Err(RecordError::BadMagic));

        let mut record = ConfigRecord {
            version: 7,
            ..sample_record()
        };
        let len = record.encode(&mut buffer).unwrap().len();
        assert_eq!(ConfigRecord::decode(&buffer[..len]), Err(RecordError::Version(7)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let mut record = sample_record();
        record.uart.divisor = 2;
        let len = record.encode(&mut buffer).unwrap().len();
        assert_eq!(
            ConfigRecord::decode(&buffer[..len]),
            Err(RecordError::Invalid(ConfigError::DivisorTooSmall))
        );
        // Address type survives serde as well
        let bytes = postcard::to_slice(&Address::TenBit(0x2A5), &mut buffer).unwrap();
        let back: Address = postcard::from_bytes(bytes).unwrap();
        assert_eq!(back, Address::TenBit(0x2A5));
    }
}
