//! Record-level mutations: moving blocks between files, statistics updates,
//! conditional deletion and location attachment.

use super::*;
use crate::domain::condition::RecordCondition;
use crate::domain::logical_file::Checkpoint;
use shared_types::{BlockStats, LocationRecord, ValueRange};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

impl<P> MetadataCatalog<P>
where
    P: CatalogPersistence,
{
    /// Move `sources[i]`'s block at `indexes[i]` to the end of `name`, in pair
    /// order. Every involved file is write-locked in name order for the whole
    /// move, so either every block moves or none does.
    pub(crate) fn move_records(
        &self,
        name: &str,
        sources: &[&str],
        indexes: &[usize],
    ) -> Result<Arc<LogicalFile>, CatalogError> {
        self.check_open()?;
        if sources.len() != indexes.len() {
            return Err(CatalogError::ShapeMismatch {
                expected: sources.len(),
                actual: indexes.len(),
            });
        }

        let mut per_source: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (source, &index) in sources.iter().zip(indexes) {
            per_source.entry(*source).or_default().push(index);
        }

        loop {
            let target = self.file_or_create(name);
            let mut involved: BTreeMap<&str, Arc<LogicalFile>> = BTreeMap::new();
            involved.insert(name, Arc::clone(&target));

            let missing = {
                let files = self.files.read();
                let mut missing = None;
                for source in per_source.keys() {
                    match files.get(*source) {
                        Some(file) => {
                            involved.insert(*source, Arc::clone(file));
                        }
                        None => {
                            missing = Some(source.to_string());
                            break;
                        }
                    }
                }
                missing
            };
            if let Some(source) = missing {
                self.discard_placeholder(name, &target);
                return Err(CatalogError::FileNotFound(source));
            }

            let _guards: Vec<_> = involved.values().map(|f| f.lock().write()).collect();
            let files = self.files.read();
            if !involved
                .iter()
                .all(|(n, f)| Self::is_current(&files, n, f))
            {
                continue;
            }

            if let Err(e) = validate_indexes(&per_source, &involved) {
                drop(files);
                self.discard_placeholder(name, &target);
                return Err(e);
            }

            let checkpoints: Vec<(&str, Checkpoint)> = involved
                .iter()
                .map(|(n, f)| (*n, f.checkpoint()))
                .collect();
            let moved = match take_in_pair_order(sources, &per_source, &involved) {
                Ok(moved) => moved,
                Err(e) => {
                    drop(files);
                    self.undo_move(name, &involved, checkpoints, &[]);
                    return Err(e);
                }
            };
            let origins: Vec<(BlockId, &str)> = moved
                .iter()
                .zip(sources)
                .map(|(b, source)| (b.block_id().clone(), *source))
                .collect();
            let ids: Vec<BlockId> = origins.iter().map(|(id, _)| id.clone()).collect();

            let version = match target.push_blocks(moved) {
                Ok(version) => version,
                Err(e) => {
                    drop(files);
                    self.undo_move(name, &involved, checkpoints, &[]);
                    return Err(e);
                }
            };
            self.owners.lock().reassign(&ids, name);
            drop(files);

            if let Err(e) = involved.values().try_for_each(|file| self.persist(file)) {
                warn!("[mv-02] Failed to persist move into {}: {}", name, e);
                self.undo_move(name, &involved, checkpoints, &origins);
                return Err(e);
            }
            debug!(
                "[mv-02] Moved {} blocks from {} files into {} (v{})",
                ids.len(),
                per_source.len(),
                name,
                version
            );
            return Ok(target);
        }
    }

    /// Replace every block's statistics of `name`; `sizes` are row counts.
    pub(crate) fn update_stats(
        &self,
        name: &str,
        dictionaries: Vec<Option<Vec<String>>>,
        sizes: Vec<u64>,
        ranges: Vec<Option<ValueRange>>,
    ) -> Result<u64, CatalogError> {
        self.check_open()?;
        self.with_file_locked(name, |file| {
            let expected = file.len();
            for actual in [dictionaries.len(), sizes.len(), ranges.len()] {
                if actual != expected {
                    return Err(CatalogError::ShapeMismatch { expected, actual });
                }
            }

            let stats = dictionaries
                .into_iter()
                .zip(sizes)
                .zip(ranges)
                .map(|((dictionary, rows), range)| BlockStats {
                    rows,
                    dictionary,
                    range,
                })
                .collect();
            let checkpoint = file.checkpoint();
            let version = file.apply_stats(stats)?;
            if let Err(e) = self.persist(file) {
                file.rollback(checkpoint);
                return Err(e);
            }
            Ok(version)
        })
        .unwrap_or_else(|| Err(CatalogError::FileNotFound(name.to_string())))
    }

    /// Remove the blocks of `name` matching any condition.
    pub(crate) fn delete_where(
        &self,
        name: &str,
        conditions: &[RecordCondition],
    ) -> Result<usize, CatalogError> {
        self.check_open()?;
        self.with_file_locked(name, |file| {
            let checkpoint = file.checkpoint();
            let removed =
                file.remove_blocks_where(|b| RecordCondition::any_matches(conditions, b));
            if removed.is_empty() {
                return Ok(0);
            }
            if let Err(e) = self.persist(file) {
                file.rollback(checkpoint);
                return Err(e);
            }

            let ids: Vec<BlockId> = removed.iter().map(|b| b.block_id().clone()).collect();
            self.owners.lock().release(&ids);
            debug!("[mv-02] Deleted {} blocks from {}", ids.len(), name);
            Ok(ids.len())
        })
        .unwrap_or_else(|| Err(CatalogError::FileNotFound(name.to_string())))
    }

    /// Restore every file involved in a failed move, hand the moved blocks
    /// back to their sources and rewrite the documents already replaced.
    /// Caller holds every involved file's write lock.
    fn undo_move(
        &self,
        name: &str,
        involved: &BTreeMap<&str, Arc<LogicalFile>>,
        checkpoints: Vec<(&str, Checkpoint)>,
        origins: &[(BlockId, &str)],
    ) {
        for (file, checkpoint) in checkpoints {
            involved[file].rollback(checkpoint);
        }
        {
            let mut owners = self.owners.lock();
            for (id, source) in origins {
                owners.reassign(std::slice::from_ref(id), source);
            }
        }
        // Without origins the move failed before any document was written.
        if origins.is_empty() {
            self.discard_placeholder(name, &involved[name]);
            return;
        }

        for (file_name, file) in involved {
            if file.version() > 0 {
                self.persist_logged(file);
            } else if let Err(e) = self.persistence.delete(file_name) {
                warn!("[mv-02] Failed to delete document of {}: {}", file_name, e);
            }
        }
        self.discard_placeholder(name, &involved[name]);
    }

    /// Attach a valid replica to the block that owns its id.
    pub(crate) fn attach(&self, location: LocationRecord) -> bool {
        if self.is_disposed() || !location.is_valid() {
            return false;
        }
        let Some(owner) = self.owner_of(location.block_id()) else {
            debug!("[mv-02] No file owns block {}", location.block_id());
            return false;
        };
        let Some(file) = self.get(&owner) else {
            return false;
        };

        let block = location.block_id().clone();
        let node = location.node().clone();
        match file.attach_location(location) {
            Some(outcome) if outcome.is_attached() => true,
            Some(_) => {
                debug!(
                    "[mv-02] Replica of {} on {} rejected: capacity reached",
                    block, node
                );
                false
            }
            None => false,
        }
    }
}

/// Take the requested blocks out of their sources and order them by pair.
fn take_in_pair_order(
    sources: &[&str],
    per_source: &BTreeMap<&str, Vec<usize>>,
    involved: &BTreeMap<&str, Arc<LogicalFile>>,
) -> Result<Vec<ServerBlockRecord>, CatalogError> {
    let mut taken: HashMap<&str, VecDeque<ServerBlockRecord>> = HashMap::new();
    for (source, source_indexes) in per_source {
        let blocks = involved[source].take_blocks_at(source_indexes)?;
        taken.insert(*source, blocks.into());
    }
    Ok(sources
        .iter()
        .filter_map(|source| taken.get_mut(*source).and_then(VecDeque::pop_front))
        .collect())
}

fn validate_indexes(
    per_source: &BTreeMap<&str, Vec<usize>>,
    involved: &BTreeMap<&str, Arc<LogicalFile>>,
) -> Result<(), CatalogError> {
    for (source, indexes) in per_source {
        let file = &involved[source];
        let ids = file.block_ids();
        let mut seen = HashSet::with_capacity(indexes.len());
        for &index in indexes {
            let Some(id) = ids.get(index) else {
                return Err(CatalogError::BlockIndexOutOfRange {
                    file: source.to_string(),
                    index,
                    len: ids.len(),
                });
            };
            if !seen.insert(index) {
                return Err(CatalogError::DuplicateBlock(id.clone()));
            }
        }
    }
    Ok(())
}
