//! File-level operations: add, append, lookup, rename, removal.

use super::*;
use crate::domain::condition::RecordCondition;
use crate::domain::document::FileDocument;
use crate::domain::report::RefreshReport;
use crate::ports::inbound::FileFilter;
use shared_types::{BlockSource, LocationRecord, ValueRange};
use tracing::debug;

impl<P> MetadataCatalogApi for MetadataCatalog<P>
where
    P: CatalogPersistence,
{
    fn add(&self, name: &str, blocks: Vec<BlockRecord>) -> Result<Arc<LogicalFile>, CatalogError> {
        self.check_open()?;
        let file = Arc::new(LogicalFile::new(name, self.server_blocks(blocks))?);
        self.install(name, &file)?;

        info!("[mv-02] 💾 Added {} ({} blocks)", name, file.len());
        Ok(file)
    }

    fn import(&self, document: FileDocument) -> Result<Arc<LogicalFile>, CatalogError> {
        self.check_open()?;
        let name = document.name.clone();
        let file = Arc::new(LogicalFile::from_document(document, self.max_replicas)?);
        self.install(&name, &file)?;

        debug!("[mv-02] Imported {} at v{}", name, file.version());
        Ok(file)
    }

    fn append(
        &self,
        name: &str,
        blocks: Vec<BlockRecord>,
    ) -> Result<Arc<LogicalFile>, CatalogError> {
        self.check_open()?;
        let blocks = self.server_blocks(blocks);
        let ids: Vec<BlockId> = blocks.iter().map(|b| b.block_id().clone()).collect();

        loop {
            let file = self.file_or_create(name);
            let _guard = file.lock().write();

            let files = self.files.read();
            if !Self::is_current(&files, name, &file) {
                continue;
            }
            let claimed = self.owners.lock().claim(&ids, name);
            let pushed = claimed.and_then(|()| {
                let pushed = file.push_blocks(blocks);
                if pushed.is_err() {
                    self.owners.lock().release(&ids);
                }
                pushed
            });
            drop(files);

            return match pushed {
                Ok(version) => {
                    self.persist_logged(&file);
                    debug!("[mv-02] Appended {} blocks to {} (v{})", ids.len(), name, version);
                    Ok(Arc::clone(&file))
                }
                Err(e) => {
                    self.discard_placeholder(name, &file);
                    Err(e)
                }
            };
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Arc<LogicalFile>> {
        self.files.read().get(name).cloned()
    }

    fn list(&self, filter: Option<FileFilter<'_>>) -> Vec<Arc<LogicalFile>> {
        let files: Vec<Arc<LogicalFile>> = self.files.read().values().cloned().collect();
        match filter {
            Some(filter) => files.into_iter().filter(|f| filter(f)).collect(),
            None => files,
        }
    }

    fn remove(&self, name: &str) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.with_file_locked(name, |file| self.remove_exact(name, file))
            .unwrap_or(false)
    }

    fn remove_matching(&self, filter: FileFilter<'_>) -> usize {
        if self.is_disposed() {
            return 0;
        }
        let candidates: Vec<(String, Arc<LogicalFile>)> = self
            .files
            .read()
            .iter()
            .map(|(name, file)| (name.clone(), Arc::clone(file)))
            .collect();

        candidates
            .iter()
            .filter(|(_, file)| filter(file))
            .filter(|(name, file)| self.remove_exact(name, file))
            .count()
    }

    fn rename_in(
        &self,
        from: &str,
        to: &str,
        from_org: Option<&str>,
        to_org: Option<&str>,
    ) -> bool {
        let from = qualify(from, from_org);
        let to = qualify(to, to_org);
        if self.is_disposed() || from == to {
            return false;
        }

        self.with_file_locked(&from, |file| {
            let mut files = self.files.write();
            if !Self::is_current(&files, &from, file) || files.contains_key(&to) {
                return false;
            }
            files.remove(&from);
            let version = file.rename_to(&to);
            files.insert(to.clone(), Arc::clone(file));
            self.owners.lock().rename_file(&from, &to);
            drop(files);

            self.persist_logged(file);
            if let Err(e) = self.persistence.delete(&from) {
                warn!("[mv-02] Failed to delete document of {}: {}", from, e);
            }
            info!("[mv-02] Renamed {} -> {} (v{})", from, to, version);
            true
        })
        .unwrap_or(false)
    }

    fn append_record(
        &self,
        name: &str,
        files: &[&str],
        block_indexes: &[usize],
    ) -> Result<Arc<LogicalFile>, CatalogError> {
        self.move_records(name, files, block_indexes)
    }

    fn update_record(
        &self,
        name: &str,
        dictionaries: Vec<Option<Vec<String>>>,
        sizes: Vec<u64>,
        ranges: Vec<Option<ValueRange>>,
    ) -> Result<u64, CatalogError> {
        self.update_stats(name, dictionaries, sizes, ranges)
    }

    fn delete_record(
        &self,
        name: &str,
        conditions: &[RecordCondition],
    ) -> Result<usize, CatalogError> {
        self.delete_where(name, conditions)
    }

    fn attach_location(&self, location: LocationRecord) -> bool {
        self.attach(location)
    }

    fn refresh(
        &self,
        sources: &[&dyn BlockSource],
        force: bool,
    ) -> Result<RefreshReport, CatalogError> {
        self.reconcile(sources, force)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let files = std::mem::take(&mut *self.files.write());
        self.owners.lock().clear();

        for file in files.values() {
            let _guard = file.lock().write();
            self.persist_logged(file);
        }
        info!("[mv-02] Catalog disposed ({} files persisted)", files.len());
    }

    /// Copy every file into `other` as persisted, version and statistics
    /// included.
    fn copy_to(&self, other: &dyn MetadataCatalogApi) {
        for file in self.list(None) {
            let document = file.document();
            let name = document.name.clone();
            if let Err(e) = other.import(document) {
                warn!("[mv-02] Failed to copy {}: {}", name, e);
            }
        }
    }
}

impl<P> MetadataCatalog<P>
where
    P: CatalogPersistence,
{
    /// Register `file` under `name`, replacing any previous file of that
    /// name and taking over its block ids.
    fn install(&self, name: &str, file: &Arc<LogicalFile>) -> Result<(), CatalogError> {
        let ids = file.block_ids();
        loop {
            let previous = self.files.read().get(name).cloned();
            let _previous_guard = previous.as_ref().map(|f| f.lock().write());
            let _guard = file.lock().write();

            let mut files = self.files.write();
            let unchanged = match &previous {
                Some(previous) => Self::is_current(&files, name, previous),
                None => !files.contains_key(name),
            };
            if !unchanged {
                continue;
            }
            self.owners.lock().replace_file(&ids, name)?;
            files.insert(name.to_string(), Arc::clone(file));
            drop(files);

            self.persist_logged(file);
            return Ok(());
        }
    }

    /// Remove `file` if it is still registered under `name`.
    fn remove_exact(&self, name: &str, file: &Arc<LogicalFile>) -> bool {
        let _guard = file.lock().write();
        {
            let mut files = self.files.write();
            if !Self::is_current(&files, name, file) {
                return false;
            }
            files.remove(name);
            self.owners.lock().release_file(name);
        }

        if let Err(e) = self.persistence.delete(name) {
            warn!("[mv-02] Failed to delete document of {}: {}", name, e);
        }
        info!("[mv-02] Removed {}", name);
        true
    }
}
