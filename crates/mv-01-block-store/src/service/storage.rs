//! # Block Store Service - BlockStoreApi
//!
//! CRUD over physical blocks. Failures are logged and reported as
//! `None`/`false`; the index is only touched once the disk agrees.

use super::*;
use crate::domain::index::ScanReport;
use crate::ports::inbound::BlockFilter;
use shared_types::{BlockRecord, PhysicalInfo};
use std::path::PathBuf;
use tracing::{debug, warn};

impl<S, C> BlockStoreApi for BlockStore<S, C>
where
    S: IndexSerializer,
    C: ChecksumProvider,
{
    fn add(&self, record: &BlockRecord, payload: &[u8]) -> Option<NodeBlockRecord> {
        if self.is_disposed() {
            warn!("[mv-01] add({}) rejected: store disposed", record.block_id());
            return None;
        }
        let id = record.block_id();
        if !id.is_path_safe() {
            warn!("[mv-01] add rejected: block id `{}` is not a valid file name", id);
            return None;
        }

        let temp = self.layout.temp_path(id, self.next_write_seq());
        if let Err(e) = write_synced(&temp, payload) {
            warn!("[mv-01] Failed to write block {}: {}", id, e);
            let _ = fs::remove_file(&temp);
            return None;
        }
        let checksum = self.checksum.payload_checksum(payload);

        let mut index = self.index.write();
        if self.is_disposed() {
            let _ = fs::remove_file(&temp);
            return None;
        }
        if let Err(e) = fs::rename(&temp, self.layout.block_path(id)) {
            warn!("[mv-01] Failed to commit block {}: {}", id, e);
            let _ = fs::remove_file(&temp);
            return None;
        }

        let mut stored = record.clone();
        if let Some(previous) = index.get(id) {
            stored.advance_version(previous.block.record().version() + 1);
        }
        let block = NodeBlockRecord::new(stored, PhysicalInfo::present(payload.len() as i64));
        index.insert(id.clone(), StoreEntry::new(block.clone(), Some(checksum)));
        self.mark_dirty();

        debug!(
            "[mv-01] Stored block {} ({} bytes, v{})",
            id,
            payload.len(),
            block.record().version()
        );
        Some(block)
    }

    fn rename(&self, from: &BlockId, to: &BlockId) -> bool {
        if self.is_disposed() || !to.is_path_safe() {
            return false;
        }

        let mut index = self.index.write();
        if !index.contains_key(from) || index.contains_key(to) {
            debug!("[mv-01] rename {} -> {} refused", from, to);
            return false;
        }
        if let Err(e) = fs::rename(self.layout.block_path(from), self.layout.block_path(to)) {
            warn!("[mv-01] Failed to rename block {} -> {}: {}", from, to, e);
            return false;
        }

        let Some(mut entry) = index.remove(from) else {
            return false;
        };
        entry.block.record_mut().set_block_id(to.clone());
        entry.block.record_mut().bump_version();
        index.insert(to.clone(), entry);
        self.mark_dirty();
        true
    }

    fn contains(&self, id: &BlockId) -> bool {
        self.index.read().contains_key(id)
    }

    fn get(&self, id: &BlockId) -> Option<NodeBlockRecord> {
        self.index.read().get(id).map(|entry| entry.block.clone())
    }

    fn update(&self, id: &BlockId) -> Option<NodeBlockRecord> {
        let mut index = self.index.write();
        let entry = index.get_mut(id)?;

        match fs::metadata(self.layout.block_path(id)) {
            Ok(meta) => {
                let length = meta.len() as i64;
                if entry.block.physical_length() != length {
                    entry.block.set_physical_length(length);
                    entry.checksum = None;
                    entry.block.record_mut().bump_version();
                    self.mark_dirty();
                } else if let Some(expected) = entry.checksum {
                    // Same length; the content may still have been rewritten.
                    match self.file_checksum(id) {
                        Ok(actual) if actual == expected => {}
                        Ok(actual) => {
                            debug!("[mv-01] Block {} rewritten in place", id);
                            entry.checksum = Some(actual);
                            entry.block.record_mut().bump_version();
                            self.mark_dirty();
                        }
                        Err(e) => {
                            warn!("[mv-01] Failed to checksum block {}: {}", id, e);
                        }
                    }
                }
            }
            Err(e) => {
                if entry.block.physical().is_present() {
                    debug!("[mv-01] Block {} lost its file: {}", id, e);
                    entry.block.invalidate();
                    entry.checksum = None;
                    entry.block.record_mut().bump_version();
                    self.mark_dirty();
                }
            }
        }
        Some(entry.block.clone())
    }

    fn get_file(&self, id: &BlockId) -> Option<PathBuf> {
        self.index
            .read()
            .contains_key(id)
            .then(|| self.layout.block_path(id))
    }

    fn list(&self, filter: Option<BlockFilter<'_>>) -> Vec<NodeBlockRecord> {
        let index = self.index.read();
        let mut blocks: Vec<NodeBlockRecord> = index
            .values()
            .filter(|entry| filter.map_or(true, |f| f(&entry.block)))
            .map(|entry| entry.block.clone())
            .collect();
        drop(index);
        blocks.sort_by(|a, b| a.block_id().cmp(b.block_id()));
        blocks
    }

    fn remove(&self, id: &BlockId) -> bool {
        let mut index = self.index.write();
        if !index.contains_key(id) {
            return false;
        }
        match fs::remove_file(self.layout.block_path(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("[mv-01] Failed to delete block {}: {}", id, e);
                return false;
            }
        }
        index.remove(id);
        self.mark_dirty();
        true
    }

    fn remove_matching(&self, filter: BlockFilter<'_>) -> usize {
        let targets: Vec<BlockId> = self
            .list(Some(filter))
            .into_iter()
            .map(|block| block.block_id().clone())
            .collect();
        targets.iter().filter(|id| self.remove(id)).count()
    }

    fn read(&self, id: &BlockId) -> Option<Vec<u8>> {
        let checksum = self.index.read().get(id)?.checksum;
        let path = self.layout.block_path(id);
        let payload = match fs::read(&path) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[mv-01] Failed to read block {}: {}", id, e);
                return None;
            }
        };
        if let Some(expected) = checksum {
            if self.checksum.payload_checksum(&payload) != expected {
                warn!("[mv-01] ⚠️ Checksum mismatch on block {}", id);
                return None;
            }
        }
        Some(payload)
    }

    fn rescan(&self) -> Result<ScanReport, BlockStoreError> {
        self.reconcile_with_disk()
    }

    fn save(&self) -> Result<(), BlockStoreError> {
        self.persist_index()
    }

    fn refresh(&self, force: bool) -> Result<ScanReport, BlockStoreError> {
        self.reload_index(force)
    }

    fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        if let Err(e) = self.persist_index() {
            warn!("[mv-01] Failed to save index on dispose: {}", e);
        }
        self.disposed.store(true, Ordering::Release);
        self.index.write().clear();
        info!("[mv-01] Block store for {} disposed", self.node_id);
    }
}

impl<S, C> BlockStore<S, C>
where
    S: IndexSerializer,
    C: ChecksumProvider,
{
    fn file_checksum(&self, id: &BlockId) -> io::Result<u32> {
        let mut file = File::open(self.layout.block_path(id))?;
        self.checksum.stream_checksum(&mut file)
    }
}
