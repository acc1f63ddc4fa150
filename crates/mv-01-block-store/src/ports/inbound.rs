//! # Inbound Ports (Driving Ports)
//!
//! The block-store API exposed to the catalog, the cluster layer and the
//! cache-monitoring UI.

use shared_types::{BlockId, BlockRecord, NodeBlockRecord};
use std::path::PathBuf;

use crate::domain::errors::BlockStoreError;
use crate::domain::index::ScanReport;

/// Record predicate used by filtered listing and removal.
pub type BlockFilter<'a> = &'a dyn Fn(&NodeBlockRecord) -> bool;

/// Physical block storage on one data node.
pub trait BlockStoreApi: Send + Sync {
    /// Store `payload` as the physical copy of `record`.
    ///
    /// Returns `None` on I/O failure, leaving any previous copy untouched.
    fn add(&self, record: &BlockRecord, payload: &[u8]) -> Option<NodeBlockRecord>;

    /// Move a block to a new id. `false` if `from` is unknown, `to` is taken or
    /// the physical rename fails.
    fn rename(&self, from: &BlockId, to: &BlockId) -> bool;

    fn contains(&self, id: &BlockId) -> bool;

    fn contains_record(&self, record: &BlockRecord) -> bool {
        self.contains(record.block_id())
    }

    fn get(&self, id: &BlockId) -> Option<NodeBlockRecord>;

    fn get_record(&self, record: &BlockRecord) -> Option<NodeBlockRecord> {
        self.get(record.block_id())
    }

    /// Re-stat one block's file and refresh its physical length and version.
    ///
    /// A missing file never raises: the record is marked invalid instead.
    fn update(&self, id: &BlockId) -> Option<NodeBlockRecord>;

    /// Path of the block's physical file, if the block is indexed.
    fn get_file(&self, id: &BlockId) -> Option<PathBuf>;

    /// Snapshot of indexed blocks, optionally filtered. Entries are owned
    /// copies, detached from the index.
    fn list(&self, filter: Option<BlockFilter<'_>>) -> Vec<NodeBlockRecord>;

    fn remove(&self, id: &BlockId) -> bool;

    fn remove_record(&self, record: &BlockRecord) -> bool {
        self.remove(record.block_id())
    }

    /// Remove every block matching `filter`; returns how many were removed.
    fn remove_matching(&self, filter: BlockFilter<'_>) -> usize;

    /// Read a block's payload, verifying its checksum when one is known.
    fn read(&self, id: &BlockId) -> Option<Vec<u8>>;

    /// Full reconciliation of the index against the block directory.
    fn rescan(&self) -> Result<ScanReport, BlockStoreError>;

    /// Persist the index.
    fn save(&self) -> Result<(), BlockStoreError>;

    /// Reload the persisted index, rescanning the disk when `force` is set or
    /// the in-memory index is stale.
    fn refresh(&self, force: bool) -> Result<ScanReport, BlockStoreError>;

    /// Persist and release the index. Later mutations are rejected.
    fn dispose(&self);
}
