//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the block store requires from its host.

use crate::domain::errors::BlockStoreError;
use crate::domain::index::IndexSnapshot;
use std::io::{self, Read};

/// Encoding of the persisted index.
pub trait IndexSerializer: Send + Sync {
    fn serialize(&self, snapshot: &IndexSnapshot) -> Result<Vec<u8>, BlockStoreError>;

    fn deserialize(&self, data: &[u8]) -> Result<IndexSnapshot, BlockStoreError>;
}

/// Block checksums. Recorded on `add`, checked on `read` and `update`.
pub trait ChecksumProvider: Send + Sync {
    fn payload_checksum(&self, payload: &[u8]) -> u32;

    /// Checksum of a stored block file without buffering it whole.
    fn stream_checksum(&self, source: &mut dyn Read) -> io::Result<u32>;
}
