//! # Logical File
//!
//! An ordered, versioned sequence of server blocks behind one `FileLock`.
//!
//! ## Versioning
//!
//! A new file starts at version 1. Every structural mutation (append, rename,
//! removal, statistics update) moves the version to `get_next_version()`.
//! Attaching a replica location is not structural and leaves it unchanged.
//!
//! ## Readiness
//!
//! After a cold load the blocks exist before their locations do. A caller that
//! needs a located block calls `await_block_ready`, which gives up every hold
//! it has on this file's lock, waits on the block's own replica latch for at
//! most `READINESS_TIMEOUT`, then takes the same holds back. The populator
//! attaches locations under the write lock, which it can only get because the
//! waiter stepped aside.

use parking_lot::RwLock;
use shared_types::{
    now_millis, AttachOutcome, BlockId, BlockStats, LocationRecord, ReplicaSet, ServerBlockRecord,
    Timestamp,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::document::{BlockDocument, FileDocument};
use super::errors::CatalogError;
use super::lock::FileLock;

/// Upper bound of a single readiness wait.
pub const READINESS_TIMEOUT: Duration = Duration::from_millis(1000);

/// Block predicate used by filtered listing.
pub type BlockPredicate<'a> = &'a dyn Fn(&ServerBlockRecord) -> bool;

#[derive(Debug)]
struct FileState {
    name: String,
    blocks: Vec<ServerBlockRecord>,
    version: u64,
    last_modified: Timestamp,
}

impl FileState {
    fn find(&self, id: &BlockId) -> Option<&ServerBlockRecord> {
        self.blocks.iter().find(|b| b.block_id() == id)
    }

    fn touch(&mut self) -> u64 {
        self.version += 1;
        self.last_modified = now_millis();
        self.version
    }
}

/// State captured before a mutation whose persistence may still fail.
#[derive(Debug)]
pub(crate) struct Checkpoint(FileState);

/// A named, versioned block sequence.
#[derive(Debug)]
pub struct LogicalFile {
    lock: FileLock,
    state: RwLock<FileState>,
}

impl LogicalFile {
    /// A version-1 file owning `blocks`. Each block's parent name is set to
    /// `name`.
    pub fn new(name: impl Into<String>, blocks: Vec<ServerBlockRecord>) -> Result<Self, CatalogError> {
        Self::build(name.into(), blocks, 1, now_millis())
    }

    /// Placeholder created right before its first append; version 0.
    pub(crate) fn empty(name: impl Into<String>) -> Self {
        Self::with_state(FileState {
            name: name.into(),
            blocks: Vec::new(),
            version: 0,
            last_modified: now_millis(),
        })
    }

    /// Rebuild a file from its persisted form with a fresh lock and no
    /// locations.
    pub fn from_document(doc: FileDocument, max_replicas: usize) -> Result<Self, CatalogError> {
        let blocks = doc
            .blocks
            .into_iter()
            .map(|b| ServerBlockRecord::with_capacity(b.record, max_replicas).with_stats(b.stats))
            .collect();
        let name = doc.name;
        Self::build(name.clone(), blocks, doc.version, doc.last_modified).map_err(|e| {
            CatalogError::CorruptCatalog {
                document: name,
                message: e.to_string(),
            }
        })
    }

    fn build(
        name: String,
        mut blocks: Vec<ServerBlockRecord>,
        version: u64,
        last_modified: Timestamp,
    ) -> Result<Self, CatalogError> {
        ensure_unique(&blocks)?;
        for block in &mut blocks {
            block.record_mut().set_parent_file_name(name.clone());
        }
        Ok(Self::with_state(FileState {
            name,
            blocks,
            version,
            last_modified,
        }))
    }

    fn with_state(state: FileState) -> Self {
        Self {
            lock: FileLock::new(),
            state: RwLock::new(state),
        }
    }

    /// The file's reader/writer lock. Holding it across several calls makes
    /// them observe one consistent state; every method re-enters it.
    pub fn lock(&self) -> &FileLock {
        &self.lock
    }

    pub fn name(&self) -> String {
        let _guard = self.lock.read();
        self.state.read().name.clone()
    }

    pub fn version(&self) -> u64 {
        let _guard = self.lock.read();
        self.state.read().version
    }

    /// The version the next structural mutation will produce.
    pub fn get_next_version(&self) -> u64 {
        self.version() + 1
    }

    pub fn last_modified(&self) -> Timestamp {
        let _guard = self.lock.read();
        self.state.read().last_modified
    }

    pub fn len(&self) -> usize {
        let _guard = self.lock.read();
        self.state.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        let _guard = self.lock.read();
        self.state
            .read()
            .blocks
            .iter()
            .map(|b| b.block_id().clone())
            .collect()
    }

    pub fn contains_block(&self, id: &BlockId) -> bool {
        let _guard = self.lock.read();
        self.state.read().find(id).is_some()
    }

    /// Detached copy of one block.
    pub fn get_block(&self, id: &BlockId) -> Option<ServerBlockRecord> {
        let _guard = self.lock.read();
        self.state.read().find(id).cloned()
    }

    /// Detached copies of the blocks, in file order.
    pub fn list(&self, filter: Option<BlockPredicate<'_>>) -> Vec<ServerBlockRecord> {
        let _guard = self.lock.read();
        self.state
            .read()
            .blocks
            .iter()
            .filter(|b| filter.map_or(true, |f| f(*b)))
            .cloned()
            .collect()
    }

    pub fn is_block_ready(&self, id: &BlockId) -> Option<bool> {
        let _guard = self.lock.read();
        self.state.read().find(id).map(ServerBlockRecord::is_ready)
    }

    /// Wait up to `READINESS_TIMEOUT` for a block to get its first location.
    ///
    /// `None` if the block is not part of this file; otherwise the readiness
    /// observed when the wait ended. The caller's lock depth is the same on
    /// return as on entry.
    pub fn await_block_ready(&self, id: &BlockId) -> Option<bool> {
        self.await_block_ready_for(id, READINESS_TIMEOUT)
    }

    pub fn await_block_ready_for(&self, id: &BlockId, timeout: Duration) -> Option<bool> {
        let readiness = {
            let _guard = self.lock.read();
            let state = self.state.read();
            let block = state.find(id)?;
            block.readiness()
        };
        if readiness.is_ready() {
            return Some(true);
        }

        let depth = self.lock.release_all();
        let ready = readiness.wait_ready(timeout);
        self.lock.restore(depth);
        Some(ready)
    }

    /// Attach a replica to the block it describes, under the write lock.
    /// `None` if the block is not part of this file.
    pub fn attach_location(&self, location: LocationRecord) -> Option<AttachOutcome> {
        let _guard = self.lock.write();
        let state = self.state.read();
        let block = state.find(location.block_id())?;
        Some(block.attach(location))
    }

    /// Persisted form of the current state.
    pub fn document(&self) -> FileDocument {
        let _guard = self.lock.read();
        let state = self.state.read();
        FileDocument {
            name: state.name.clone(),
            version: state.version,
            last_modified: state.last_modified,
            blocks: state
                .blocks
                .iter()
                .map(|b| BlockDocument {
                    record: b.record().clone(),
                    stats: b.stats().clone(),
                })
                .collect(),
        }
    }

    // =========================================================================
    // STRUCTURAL MUTATION (catalog only)
    // =========================================================================

    /// Readiness latch of every block, keyed by block id.
    pub(crate) fn readiness_by_block(&self) -> Vec<(BlockId, Arc<ReplicaSet>)> {
        let _guard = self.lock.read();
        self.state
            .read()
            .blocks
            .iter()
            .map(|b| (b.block_id().clone(), b.readiness()))
            .collect()
    }

    /// Reuse the latches of blocks already known to the live catalog, so a
    /// reload neither loses their locations nor strands their waiters.
    pub(crate) fn adopt_readiness(&mut self, carried: &HashMap<BlockId, Arc<ReplicaSet>>) {
        for block in &mut self.state.get_mut().blocks {
            if let Some(replicas) = carried.get(block.block_id()) {
                *block = share(block).with_readiness(Arc::clone(replicas));
            }
        }
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        let _guard = self.lock.read();
        let state = self.state.read();
        Checkpoint(FileState {
            name: state.name.clone(),
            blocks: state.blocks.iter().map(share).collect(),
            version: state.version,
            last_modified: state.last_modified,
        })
    }

    /// Put back the state captured by `checkpoint`. Blocks keep their latches.
    pub(crate) fn rollback(&self, checkpoint: Checkpoint) {
        let _guard = self.lock.write();
        *self.state.write() = checkpoint.0;
    }

    /// Append blocks at the end; ids must be new to this file.
    pub(crate) fn push_blocks(&self, blocks: Vec<ServerBlockRecord>) -> Result<u64, CatalogError> {
        let _guard = self.lock.write();
        let mut state = self.state.write();
        ensure_unique(&blocks)?;
        if let Some(dup) = blocks.iter().find(|b| state.find(b.block_id()).is_some()) {
            return Err(CatalogError::DuplicateBlock(dup.block_id().clone()));
        }

        let name = state.name.clone();
        for mut block in blocks {
            block.record_mut().set_parent_file_name(name.clone());
            state.blocks.push(block);
        }
        Ok(state.touch())
    }

    pub(crate) fn rename_to(&self, name: &str) -> u64 {
        let _guard = self.lock.write();
        let mut state = self.state.write();
        state.name = name.to_string();
        for block in &mut state.blocks {
            block.record_mut().set_parent_file_name(name);
        }
        state.touch()
    }

    /// Remove the blocks at `indexes` (positions before any removal) and
    /// return them in the order requested.
    pub(crate) fn take_blocks_at(
        &self,
        indexes: &[usize],
    ) -> Result<Vec<ServerBlockRecord>, CatalogError> {
        let _guard = self.lock.write();
        let mut state = self.state.write();

        let len = state.blocks.len();
        let mut seen = HashSet::with_capacity(indexes.len());
        for &index in indexes {
            if index >= len {
                return Err(CatalogError::BlockIndexOutOfRange {
                    file: state.name.clone(),
                    index,
                    len,
                });
            }
            if !seen.insert(index) {
                return Err(CatalogError::DuplicateBlock(
                    state.blocks[index].block_id().clone(),
                ));
            }
        }
        if indexes.is_empty() {
            return Ok(Vec::new());
        }

        let mut order: Vec<(usize, usize)> = indexes
            .iter()
            .enumerate()
            .map(|(slot, &index)| (index, slot))
            .collect();
        order.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut taken: Vec<Option<ServerBlockRecord>> = (0..indexes.len()).map(|_| None).collect();
        for (index, slot) in order {
            taken[slot] = Some(state.blocks.remove(index));
        }
        state.touch();
        Ok(taken.into_iter().flatten().collect())
    }

    /// Remove every block matching `predicate`; the version moves only when
    /// something was removed.
    pub(crate) fn remove_blocks_where<F>(&self, predicate: F) -> Vec<ServerBlockRecord>
    where
        F: Fn(&ServerBlockRecord) -> bool,
    {
        let _guard = self.lock.write();
        let mut state = self.state.write();

        let (removed, kept): (Vec<_>, Vec<_>) =
            state.blocks.drain(..).partition(|b| predicate(b));
        state.blocks = kept;
        if !removed.is_empty() {
            state.touch();
        }
        removed
    }

    /// Replace every block's statistics, one entry per block in order.
    pub(crate) fn apply_stats(&self, stats: Vec<BlockStats>) -> Result<u64, CatalogError> {
        let _guard = self.lock.write();
        let mut state = self.state.write();
        if stats.len() != state.blocks.len() {
            return Err(CatalogError::ShapeMismatch {
                expected: state.blocks.len(),
                actual: stats.len(),
            });
        }
        for (block, stats) in state.blocks.iter_mut().zip(stats) {
            *block.stats_mut() = stats;
        }
        Ok(state.touch())
    }
}

impl Clone for LogicalFile {
    /// Deep copy for isolated readers: every block is cloned independently and
    /// the copy gets its own lock.
    fn clone(&self) -> Self {
        let _guard = self.lock.read();
        let state = self.state.read();
        Self::with_state(FileState {
            name: state.name.clone(),
            blocks: state.blocks.clone(),
            version: state.version,
            last_modified: state.last_modified,
        })
    }
}

/// Copy of `block` that shares its replica set.
fn share(block: &ServerBlockRecord) -> ServerBlockRecord {
    ServerBlockRecord::new(block.record().clone())
        .with_stats(block.stats().clone())
        .with_readiness(block.readiness())
}

fn ensure_unique(blocks: &[ServerBlockRecord]) -> Result<(), CatalogError> {
    let mut seen = HashSet::with_capacity(blocks.len());
    for block in blocks {
        if !seen.insert(block.block_id()) {
            return Err(CatalogError::DuplicateBlock(block.block_id().clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockRecord, NodeBlockRecord, NodeId, PhysicalInfo};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Instant;

    fn server_block(id: &str, len: i64) -> ServerBlockRecord {
        ServerBlockRecord::new(BlockRecord::new("", id, len))
    }

    fn make_file(ids: &[&str]) -> LogicalFile {
        LogicalFile::new("report1.bin", ids.iter().map(|id| server_block(id, 4)).collect()).unwrap()
    }

    fn location(node: &str, id: &str) -> LocationRecord {
        let block = NodeBlockRecord::new(BlockRecord::new("report1.bin", id, 4), PhysicalInfo::present(4));
        LocationRecord::from_node_record(NodeId::from(node), &block)
    }

    #[test]
    fn test_new_file_is_version_one() {
        let file = make_file(&["a", "b"]);
        assert_eq!(file.version(), 1);
        assert_eq!(file.get_next_version(), 2);
        assert_eq!(file.len(), 2);
        assert_eq!(file.get_block(&BlockId::from("a")).unwrap().record().parent_file_name(), "report1.bin");
    }

    #[test]
    fn test_mutation_lands_on_next_version() {
        let file = make_file(&["a"]);
        let next = file.get_next_version();
        assert_eq!(file.push_blocks(vec![server_block("b", 2)]).unwrap(), next);
        assert_eq!(file.version(), next);

        let next = file.get_next_version();
        file.rename_to("report2.bin");
        assert_eq!(file.version(), next);
        assert_eq!(file.get_block(&BlockId::from("b")).unwrap().record().parent_file_name(), "report2.bin");
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        assert!(LogicalFile::new("f", vec![server_block("a", 1), server_block("a", 1)]).is_err());

        let file = make_file(&["a"]);
        let err = file.push_blocks(vec![server_block("a", 1)]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateBlock(BlockId::from("a")));
        assert_eq!(file.version(), 1);
    }

    #[test]
    fn test_list_is_ordered_and_detached() {
        let file = make_file(&["a", "b", "c"]);
        let not_b = |b: &ServerBlockRecord| b.block_id().as_str() != "b";
        let ids: Vec<String> = file
            .list(Some(&not_b))
            .iter()
            .map(|b| b.block_id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        let copy = file.get_block(&BlockId::from("a")).unwrap();
        copy.attach(location("r1.n1", "a"));
        assert_eq!(file.is_block_ready(&BlockId::from("a")), Some(false));
    }

    #[test]
    fn test_clone_is_deep() {
        let file = make_file(&["a"]);
        let copy = file.clone();
        copy.attach_location(location("r1.n1", "a")).unwrap();

        assert_eq!(copy.is_block_ready(&BlockId::from("a")), Some(true));
        assert_eq!(file.is_block_ready(&BlockId::from("a")), Some(false));
        assert_eq!(copy.version(), file.version());
    }

    #[test]
    fn test_take_blocks_in_requested_order() {
        let file = make_file(&["a", "b", "c", "d"]);
        let taken = file.take_blocks_at(&[3, 1]).unwrap();
        let ids: Vec<&str> = taken.iter().map(|b| b.block_id().as_str()).collect();
        assert_eq!(ids, vec!["d", "b"]);
        assert_eq!(file.block_ids(), vec![BlockId::from("a"), BlockId::from("c")]);
        assert_eq!(file.version(), 2);

        assert!(matches!(
            file.take_blocks_at(&[5]),
            Err(CatalogError::BlockIndexOutOfRange { index: 5, len: 2, .. })
        ));
        assert_eq!(file.version(), 2);
    }

    #[test]
    fn test_apply_stats_checks_shape() {
        let file = make_file(&["a", "b"]);
        let err = file.apply_stats(vec![BlockStats::default()]).unwrap_err();
        assert_eq!(err, CatalogError::ShapeMismatch { expected: 2, actual: 1 });
        assert_eq!(file.version(), 1);
    }

    #[test]
    fn test_document_round_trip() {
        let file = make_file(&["a", "b"]);
        file.push_blocks(vec![server_block("c", 9)]).unwrap();
        let restored = LogicalFile::from_document(file.document(), 1).unwrap();

        assert_eq!(restored.name(), "report1.bin");
        assert_eq!(restored.version(), file.version());
        assert_eq!(restored.block_ids(), file.block_ids());
        assert_eq!(restored.is_block_ready(&BlockId::from("c")), Some(false));
    }

    #[test]
    fn test_readiness_wait_times_out_and_restores_depth() {
        let file = make_file(&["a"]);
        let _r1 = file.lock().read();
        let _r2 = file.lock().read();
        let _w = file.lock().write();
        let before = file.lock().hold_counts();

        let started = Instant::now();
        assert_eq!(file.await_block_ready(&BlockId::from("a")), Some(false));
        let waited = started.elapsed();

        assert!(waited >= Duration::from_millis(900), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(5), "waited {:?}", waited);
        assert_eq!(file.lock().hold_counts(), before);
    }

    #[test]
    fn test_ready_block_returns_immediately() {
        let file = make_file(&["a"]);
        file.attach_location(location("r1.n1", "a")).unwrap();

        let started = Instant::now();
        assert_eq!(file.await_block_ready(&BlockId::from("a")), Some(true));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(file.await_block_ready(&BlockId::from("zz")), None);
    }

    #[test]
    fn test_waiter_holding_read_lock_does_not_starve_populator() {
        let file = Arc::new(make_file(&["a"]));
        let (started_tx, started_rx) = mpsc::channel();

        let waiter = {
            let file = Arc::clone(&file);
            thread::spawn(move || {
                let _guard = file.lock().read();
                started_tx.send(()).unwrap();
                let ready = file.await_block_ready_for(&BlockId::from("a"), Duration::from_secs(10));
                (ready, file.lock().hold_counts())
            })
        };

        started_rx.recv().unwrap();
        // Attaching needs the write lock the waiter held on entry.
        let outcome = file.attach_location(location("r1.n1", "a")).unwrap();
        assert_eq!(outcome, AttachOutcome::BecameReady);

        let (ready, depth) = waiter.join().unwrap();
        assert_eq!(ready, Some(true));
        assert_eq!(depth.reads, 1);
    }
}
