//! # Block Store Service
//!
//! The service implementing `BlockStoreApi` for one data node.
//!
//! ## Architecture
//!
//! - Block payloads are written to a scratch file, synced, then renamed into
//!   place while the index write lock is held, so the index and the directory
//!   never disagree about a committed block.
//! - The index lives behind a `parking_lot::RwLock`; readers never block each
//!   other.
//! - Persistence (`save`/`refresh`) goes through the injected `IndexSerializer`.

mod scan;
mod storage;
mod transfer;

use crate::adapters::{BincodeIndexSerializer, Crc32Checksum};
use crate::domain::errors::BlockStoreError;
use crate::domain::index::StoreEntry;
use crate::domain::layout::StoreLayout;
use crate::ports::inbound::BlockStoreApi;
use crate::ports::outbound::{ChecksumProvider, IndexSerializer};
use parking_lot::{Mutex, RwLock};
use shared_types::{BlockId, BlockSource, FsConfig, NodeBlockRecord, NodeId};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Physical block storage of a single data node.
pub struct BlockStore<S = BincodeIndexSerializer, C = Crc32Checksum>
where
    S: IndexSerializer,
    C: ChecksumProvider,
{
    pub(crate) node_id: NodeId,
    pub(crate) layout: StoreLayout,
    /// Index age after which `refresh(false)` rescans the disk.
    pub(crate) map_expired: Duration,
    pub(crate) index: RwLock<HashMap<BlockId, StoreEntry>>,
    pub(crate) last_scan: Mutex<Option<Instant>>,
    /// Set by every mutation, cleared by `save`.
    pub(crate) dirty: AtomicBool,
    /// Set once `blocks.idx` has been read into `index`.
    pub(crate) index_loaded: AtomicBool,
    pub(crate) disposed: AtomicBool,
    pub(crate) write_seq: AtomicU64,
    pub(crate) serializer: S,
    pub(crate) checksum: C,
}

/// Dependencies for BlockStore
pub struct BlockStoreDependencies<S, C> {
    pub serializer: S,
    pub checksum: C,
}

impl Default for BlockStoreDependencies<BincodeIndexSerializer, Crc32Checksum> {
    fn default() -> Self {
        Self {
            serializer: BincodeIndexSerializer,
            checksum: Crc32Checksum,
        }
    }
}

impl BlockStore {
    /// Open (or create) the store of `node_id` under the configured work root.
    pub fn open(config: &FsConfig, node_id: NodeId) -> Result<Self, BlockStoreError> {
        Self::with_dependencies(config, node_id, BlockStoreDependencies::default())
    }
}

impl<S, C> BlockStore<S, C>
where
    S: IndexSerializer,
    C: ChecksumProvider,
{
    /// Open a store with explicit serializer and checksum adapters.
    ///
    /// On construction the persisted index is loaded and, because no scan has
    /// happened yet, reconciled against the block directory.
    pub fn with_dependencies(
        config: &FsConfig,
        node_id: NodeId,
        deps: BlockStoreDependencies<S, C>,
    ) -> Result<Self, BlockStoreError> {
        let layout = StoreLayout::new(config.work_dir(&node_id));
        let blocks_dir = layout.blocks_dir();
        fs::create_dir_all(&blocks_dir).map_err(|e| BlockStoreError::io(&blocks_dir, e))?;

        let store = Self {
            node_id,
            layout,
            map_expired: config.map_expired(),
            index: RwLock::new(HashMap::new()),
            last_scan: Mutex::new(None),
            dirty: AtomicBool::new(false),
            index_loaded: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            write_seq: AtomicU64::new(0),
            serializer: deps.serializer,
            checksum: deps.checksum,
        };

        store.refresh(false)?;
        info!(
            "[mv-01] 💾 Opened block store for {} ({} blocks)",
            store.node_id,
            store.len()
        );
        Ok(store)
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub(crate) fn next_write_seq(&self) -> u64 {
        self.write_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// The index has not been reconciled with the disk within `map_expired`.
    pub(crate) fn is_stale(&self) -> bool {
        match *self.last_scan.lock() {
            Some(at) => at.elapsed() >= self.map_expired,
            None => true,
        }
    }
}

impl<S, C> BlockSource for BlockStore<S, C>
where
    S: IndexSerializer,
    C: ChecksumProvider,
{
    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    fn list_blocks(&self) -> Vec<NodeBlockRecord> {
        self.list(None)
    }
}

/// Write `data` to `path` and flush it to stable storage.
pub(crate) fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}
