//! Infrastructure Adapters
//!
//! Checksums over block payloads and block files.

mod crc32;

pub use crc32::Crc32Checksum;
