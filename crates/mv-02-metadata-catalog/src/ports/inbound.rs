//! # Inbound Ports (Driving Ports)
//!
//! The catalog API used by the materialized-view engine, the cluster layer and
//! the cache-monitoring UI.

use shared_types::{BlockRecord, BlockSource, LocationRecord, ValueRange};
use std::sync::Arc;

use crate::domain::condition::RecordCondition;
use crate::domain::document::FileDocument;
use crate::domain::errors::CatalogError;
use crate::domain::logical_file::LogicalFile;
use crate::domain::report::RefreshReport;

/// File predicate used by filtered listing and removal.
pub type FileFilter<'a> = &'a dyn Fn(&LogicalFile) -> bool;

/// Authoritative mapping of logical file names to block sequences.
pub trait MetadataCatalogApi: Send + Sync {
    /// Register `name` with `blocks` at version 1, replacing any previous
    /// file of that name.
    fn add(&self, name: &str, blocks: Vec<BlockRecord>) -> Result<Arc<LogicalFile>, CatalogError>;

    /// Extend `name` with `blocks`, creating it first when absent.
    fn append(&self, name: &str, blocks: Vec<BlockRecord>)
        -> Result<Arc<LogicalFile>, CatalogError>;

    /// Register a file exactly as persisted, keeping its version, statistics
    /// and modification time. Replaces any previous file of that name.
    fn import(&self, document: FileDocument) -> Result<Arc<LogicalFile>, CatalogError>;

    fn contains(&self, name: &str) -> bool;

    /// The live file. Use `LogicalFile::clone` for an isolated snapshot.
    fn get(&self, name: &str) -> Option<Arc<LogicalFile>>;

    /// Files in name order, optionally filtered.
    fn list(&self, filter: Option<FileFilter<'_>>) -> Vec<Arc<LogicalFile>>;

    fn remove(&self, name: &str) -> bool;

    fn remove_file(&self, file: &LogicalFile) -> bool {
        self.remove(&file.name())
    }

    /// Remove every file matching `filter`; returns how many were removed.
    fn remove_matching(&self, filter: FileFilter<'_>) -> usize;

    /// `false` if `from` is unknown or `to` is taken.
    fn rename(&self, from: &str, to: &str) -> bool {
        self.rename_in(from, to, None, None)
    }

    /// Rename across organisations; a present org qualifies the name as
    /// `<org>:<name>`.
    fn rename_in(&self, from: &str, to: &str, from_org: Option<&str>, to_org: Option<&str>)
        -> bool;

    /// Move `files[i]`'s block at `block_indexes[i]` to the end of `name`.
    fn append_record(
        &self,
        name: &str,
        files: &[&str],
        block_indexes: &[usize],
    ) -> Result<Arc<LogicalFile>, CatalogError>;

    /// Replace per-block statistics, one entry per block in order. Returns the
    /// new file version.
    fn update_record(
        &self,
        name: &str,
        dictionaries: Vec<Option<Vec<String>>>,
        sizes: Vec<u64>,
        ranges: Vec<Option<ValueRange>>,
    ) -> Result<u64, CatalogError>;

    /// Remove the blocks matching any condition; returns how many went.
    fn delete_record(&self, name: &str, conditions: &[RecordCondition])
        -> Result<usize, CatalogError>;

    /// Link a physical replica to its catalog block. `false` if no file owns
    /// the block or its replica capacity is full.
    fn attach_location(&self, location: LocationRecord) -> bool;

    /// Reconcile against data-node block inventories; `force` reloads the
    /// persisted documents first.
    fn refresh(
        &self,
        sources: &[&dyn BlockSource],
        force: bool,
    ) -> Result<RefreshReport, CatalogError>;

    /// Persist every file and release the in-memory tree.
    fn dispose(&self);

    /// Migration hook to another catalog implementation.
    fn copy_to(&self, _other: &dyn MetadataCatalogApi) {}
}
