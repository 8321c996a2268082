//! Persisted configuration
//!
//! Engine configuration stored as postcard binary data behind a magic
//! number, a format version and a CRC.

pub mod record;

pub use record::{ConfigRecord, RecordError, MAX_RECORD_SIZE, RECORD_MAGIC, RECORD_VERSION};
