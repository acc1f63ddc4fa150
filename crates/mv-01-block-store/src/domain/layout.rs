//! On-disk layout of a node's block directory.

use shared_types::BlockId;
use std::path::{Path, PathBuf};

/// Extension of a committed block file.
pub const BLOCK_EXT: &str = "blk";

/// Extension of a block file still being written.
pub const TEMP_EXT: &str = "tmp";

const BLOCKS_DIR: &str = "blocks";
const INDEX_FILE: &str = "blocks.idx";

/// Paths of a block store rooted at a node's work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blocks_dir(&self) -> PathBuf {
        self.root.join(BLOCKS_DIR)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn block_path(&self, id: &BlockId) -> PathBuf {
        self.blocks_dir().join(format!("{}.{}", id, BLOCK_EXT))
    }

    /// Scratch file for an in-flight write; `seq` keeps concurrent writers apart.
    pub fn temp_path(&self, id: &BlockId, seq: u64) -> PathBuf {
        self.blocks_dir()
            .join(format!("{}.{}.{}.{}", id, BLOCK_EXT, seq, TEMP_EXT))
    }

    /// Block id encoded in a committed block file's name.
    pub fn block_id_of(path: &Path) -> Option<BlockId> {
        if path.extension()? != BLOCK_EXT {
            return None;
        }
        let id = BlockId::new(path.file_stem()?.to_str()?);
        id.is_path_safe().then_some(id)
    }
}
