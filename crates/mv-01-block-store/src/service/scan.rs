//! # Block Store Service - Index Persistence and Rescan
//!
//! The index is a cache of the block directory. `reconcile_with_disk` rebuilds
//! the physical side from the files present; `persist_index` and
//! `reload_index` move it to and from `blocks.idx`.

use super::*;
use crate::domain::index::{IndexSnapshot, ScanReport};
use rayon::prelude::*;
use shared_types::{BlockRecord, PhysicalInfo};
use std::path::PathBuf;
use tracing::{debug, warn};

impl<S, C> BlockStore<S, C>
where
    S: IndexSerializer,
    C: ChecksumProvider,
{
    /// Committed block files and their sizes. Metadata is gathered in parallel.
    fn scan_block_dir(&self) -> Result<HashMap<BlockId, i64>, BlockStoreError> {
        let dir = self.layout.blocks_dir();
        let paths: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| BlockStoreError::io(&dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();

        Ok(paths
            .par_iter()
            .filter_map(|path| {
                let id = StoreLayout::block_id_of(path)?;
                let meta = fs::metadata(path).ok()?;
                meta.is_file().then(|| (id, meta.len() as i64))
            })
            .collect())
    }

    /// Full reconciliation. Files unknown to the index are adopted with an
    /// empty parent name; entries whose file vanished are dropped.
    pub(crate) fn reconcile_with_disk(&self) -> Result<ScanReport, BlockStoreError> {
        if self.is_disposed() {
            return Err(BlockStoreError::Disposed);
        }

        // Held across the walk: adds commit their file under this lock.
        let mut index = self.index.write();
        let on_disk = self.scan_block_dir()?;
        let mut report = ScanReport::default();

        index.retain(|id, _| {
            let present = on_disk.contains_key(id);
            if !present {
                report.removed += 1;
            }
            present
        });

        for (id, length) in on_disk {
            match index.get_mut(&id) {
                Some(entry) => {
                    if entry.block.physical_length() != length {
                        entry.block.set_physical_length(length);
                        entry.checksum = None;
                        entry.block.record_mut().bump_version();
                        report.changed += 1;
                    }
                }
                None => {
                    let block = NodeBlockRecord::new(
                        BlockRecord::new("", id.clone(), length),
                        PhysicalInfo::present(length),
                    );
                    index.insert(id, StoreEntry::new(block, None));
                    report.added += 1;
                }
            }
        }
        drop(index);

        *self.last_scan.lock() = Some(Instant::now());
        if !report.is_clean() {
            self.mark_dirty();
            info!(
                "[mv-01] 🔍 Rescan of {}: +{} -{} ~{}",
                self.node_id, report.added, report.removed, report.changed
            );
        }
        Ok(report)
    }

    /// Write the index atomically: scratch file, fsync, rename.
    pub(crate) fn persist_index(&self) -> Result<(), BlockStoreError> {
        if self.is_disposed() {
            return Err(BlockStoreError::Disposed);
        }

        // Cleared before the snapshot so a concurrent mutation re-marks it.
        self.dirty.store(false, Ordering::Release);
        let snapshot = {
            let index = self.index.read();
            let mut entries: Vec<StoreEntry> = index.values().cloned().collect();
            entries.sort_by(|a, b| a.block.block_id().cmp(b.block.block_id()));
            IndexSnapshot::new(entries)
        };

        let result = self.write_snapshot(&snapshot);
        if result.is_err() {
            self.mark_dirty();
        }
        result
    }

    fn write_snapshot(&self, snapshot: &IndexSnapshot) -> Result<(), BlockStoreError> {
        let bytes = self.serializer.serialize(snapshot)?;
        let path = self.layout.index_path();
        let temp = path.with_extension("idx.tmp");

        write_synced(&temp, &bytes).map_err(|e| BlockStoreError::io(&temp, e))?;
        fs::rename(&temp, &path).map_err(|e| BlockStoreError::io(&path, e))?;

        debug!(
            "[mv-01] Saved index of {} ({} entries)",
            self.node_id,
            snapshot.entries.len()
        );
        Ok(())
    }

    /// Flush pending changes, then rescan when forced, stale, or when the
    /// persisted index is missing or unreadable. `blocks.idx` is read only
    /// on the first refresh; after that the in-memory index is authoritative.
    pub(crate) fn reload_index(&self, force: bool) -> Result<ScanReport, BlockStoreError> {
        if self.is_disposed() {
            return Err(BlockStoreError::Disposed);
        }
        if self.dirty.load(Ordering::Acquire) {
            self.persist_index()?;
        }

        let mut needs_scan = force || self.is_stale();
        match self.load_index() {
            Ok(true) => {}
            Ok(false) => needs_scan = true,
            Err(e @ BlockStoreError::CorruptIndex { .. }) => {
                warn!("[mv-01] ⚠️ Discarding index: {}", e);
                needs_scan = true;
            }
            Err(e) => return Err(e),
        }

        if needs_scan {
            self.reconcile_with_disk()
        } else {
            Ok(ScanReport::default())
        }
    }

    /// Replace the in-memory index with `blocks.idx` unless that already
    /// happened. `Ok(false)` when there is no persisted index.
    pub(crate) fn load_index(&self) -> Result<bool, BlockStoreError> {
        let mut index = self.index.write();
        if self.index_loaded.swap(true, Ordering::AcqRel) {
            return Ok(true);
        }

        let path = self.layout.index_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                self.index_loaded.store(false, Ordering::Release);
                return Err(BlockStoreError::io(&path, e));
            }
        };
        let snapshot =
            self.serializer
                .deserialize(&bytes)
                .map_err(|e| BlockStoreError::CorruptIndex {
                    path: path.clone(),
                    message: e.to_string(),
                })?;

        *index = snapshot
            .entries
            .into_iter()
            .map(|entry| (entry.block.block_id().clone(), entry))
            .collect();
        Ok(true)
    }
}
