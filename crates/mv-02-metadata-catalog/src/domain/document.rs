//! Persisted shape of a logical file: everything but the lock and the
//! replica locations.

use shared_types::{BlockRecord, BlockStats, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDocument {
    pub record: BlockRecord,
    pub stats: BlockStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDocument {
    pub name: String,
    pub version: u64,
    pub last_modified: Timestamp,
    pub blocks: Vec<BlockDocument>,
}
