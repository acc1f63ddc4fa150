//! # Metadata Catalog Service
//!
//! The service implementing `MetadataCatalogApi` on the server node.
//!
//! ## Lock Order
//!
//! ```text
//! FileLock (ascending file name) → catalog map → block owners
//! ```
//!
//! The catalog map is never held while waiting for a `FileLock`. A mutation
//! first takes the file's write lock, then confirms under the map lock that the
//! file is still the one registered under its name, retrying if a concurrent
//! rename or removal replaced it.

mod catalog;
mod reconcile;
mod records;

use crate::adapters::XmlDirectoryStore;
use crate::domain::errors::CatalogError;
use crate::domain::logical_file::LogicalFile;
use crate::domain::owners::BlockOwners;
use crate::ports::inbound::MetadataCatalogApi;
use crate::ports::outbound::CatalogPersistence;
use parking_lot::{Mutex, RwLock};
use shared_types::{BlockId, BlockRecord, FsConfig, ServerBlockRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// The authoritative catalog of logical files.
pub struct MetadataCatalog<P = XmlDirectoryStore>
where
    P: CatalogPersistence,
{
    pub(crate) files: RwLock<BTreeMap<String, Arc<LogicalFile>>>,
    pub(crate) owners: Mutex<BlockOwners>,
    pub(crate) persistence: P,
    /// Replica capacity given to every server block.
    pub(crate) max_replicas: usize,
    /// Set once the persisted documents have been read.
    pub(crate) loaded: AtomicBool,
    pub(crate) disposed: AtomicBool,
}

impl MetadataCatalog {
    /// Open the catalog stored under the configured catalog directory.
    pub fn open(config: &FsConfig) -> Result<Self, CatalogError> {
        let store = XmlDirectoryStore::new(config.catalog_dir())?;
        Self::with_persistence(store, config.max_replicas)
    }
}

impl<P> MetadataCatalog<P>
where
    P: CatalogPersistence,
{
    /// Build a catalog over `persistence` and load every readable document.
    pub fn with_persistence(persistence: P, max_replicas: usize) -> Result<Self, CatalogError> {
        let catalog = Self {
            files: RwLock::new(BTreeMap::new()),
            owners: Mutex::new(BlockOwners::default()),
            persistence,
            max_replicas: max_replicas.max(1),
            loaded: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        };

        let report = catalog.refresh(&[], true)?;
        info!(
            "[mv-02] 📚 Catalog opened: {} files ({} discarded)",
            report.files_loaded, report.discarded
        );
        Ok(catalog)
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn max_replicas(&self) -> usize {
        self.max_replicas
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Name of the file owning a block.
    pub fn owner_of(&self, id: &BlockId) -> Option<String> {
        self.owners.lock().owner_of(id).map(str::to_string)
    }

    /// Isolated deep copy of a file.
    pub fn snapshot(&self, name: &str) -> Option<LogicalFile> {
        self.get(name).map(|file| (*file).clone())
    }

    pub(crate) fn check_open(&self) -> Result<(), CatalogError> {
        if self.is_disposed() {
            Err(CatalogError::Disposed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn server_blocks(&self, records: Vec<BlockRecord>) -> Vec<ServerBlockRecord> {
        records
            .into_iter()
            .map(|record| ServerBlockRecord::with_capacity(record, self.max_replicas))
            .collect()
    }

    /// `file` is still the one registered under `name`.
    pub(crate) fn is_current(
        files: &BTreeMap<String, Arc<LogicalFile>>,
        name: &str,
        file: &Arc<LogicalFile>,
    ) -> bool {
        files.get(name).map_or(false, |f| Arc::ptr_eq(f, file))
    }

    /// Registered file, or a version-0 placeholder inserted for `name`.
    pub(crate) fn file_or_create(&self, name: &str) -> Arc<LogicalFile> {
        if let Some(file) = self.files.read().get(name) {
            return Arc::clone(file);
        }
        let mut files = self.files.write();
        Arc::clone(
            files
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(LogicalFile::empty(name))),
        )
    }

    /// Drop a placeholder that never received its first mutation.
    pub(crate) fn discard_placeholder(&self, name: &str, file: &Arc<LogicalFile>) {
        let mut files = self.files.write();
        if Self::is_current(&files, name, file) && file.version() == 0 {
            files.remove(name);
        }
    }

    /// Run `f` on the file registered under `name` while holding its write
    /// lock. `None` if no such file exists.
    pub(crate) fn with_file_locked<R>(
        &self,
        name: &str,
        f: impl FnOnce(&Arc<LogicalFile>) -> R,
    ) -> Option<R> {
        loop {
            let file = self.files.read().get(name).cloned()?;
            let _guard = file.lock().write();
            if !Self::is_current(&self.files.read(), name, &file) {
                continue;
            }
            return Some(f(&file));
        }
    }

    pub(crate) fn persist(&self, file: &LogicalFile) -> Result<(), CatalogError> {
        self.persistence.store(&file.document())
    }

    /// Persist where the caller has no error channel.
    pub(crate) fn persist_logged(&self, file: &LogicalFile) {
        if let Err(e) = self.persist(file) {
            warn!("[mv-02] Failed to persist {}: {}", file.name(), e);
        }
    }
}

/// `<org>:<name>` when an organisation is given.
pub(crate) fn qualify(name: &str, org: Option<&str>) -> String {
    match org {
        Some(org) if !org.is_empty() => format!("{}:{}", org, name),
        _ => name.to_string(),
    }
}
