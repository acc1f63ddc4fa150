//! # Block Index
//!
//! In-memory index entries, their persisted snapshot, and the report produced
//! by a disk rescan.

use serde::{Deserialize, Serialize};
use shared_types::NodeBlockRecord;

/// Current index snapshot format.
pub const INDEX_FORMAT: u32 = 1;

/// One indexed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub block: NodeBlockRecord,
    /// CRC32 of the payload, known when the block was written through this store.
    pub checksum: Option<u32>,
}

impl StoreEntry {
    pub fn new(block: NodeBlockRecord, checksum: Option<u32>) -> Self {
        Self { block, checksum }
    }
}

/// Persisted form of the whole index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub format: u32,
    pub entries: Vec<StoreEntry>,
}

impl IndexSnapshot {
    pub fn new(entries: Vec<StoreEntry>) -> Self {
        Self {
            format: INDEX_FORMAT,
            entries,
        }
    }
}

/// Outcome of reconciling the index against the block directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files found on disk that the index did not know.
    pub added: usize,
    /// Index entries whose file disappeared.
    pub removed: usize,
    /// Entries whose physical length changed.
    pub changed: usize,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.changed == 0
    }
}
