//! # Catalog Errors
//!
//! Record-mutation APIs return these so the materialized-view engine can tell
//! a no-op from a rejected or failed change. Lookups, renames and removals
//! report "not found" as `None`/`false` instead.

use shared_types::{BlockId, CodecError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Logical file not found: {0}")]
    FileNotFound(String),

    #[error("Block index {index} out of range for {file} ({len} blocks)")]
    BlockIndexOutOfRange {
        file: String,
        index: usize,
        len: usize,
    },

    /// Parallel argument lists disagree with each other or with the file.
    #[error("Shape mismatch: expected {expected} entries, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// The block id is already used, in this file or another.
    #[error("Duplicate block id: {0}")]
    DuplicateBlock(BlockId),

    #[error("I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Corrupt catalog document {document}: {message}")]
    CorruptCatalog { document: String, message: String },

    #[error("Metadata catalog has been disposed")]
    Disposed,
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn corrupt(document: impl Into<String>, err: CodecError) -> Self {
        CatalogError::CorruptCatalog {
            document: document.into(),
            message: err.to_string(),
        }
    }
}
