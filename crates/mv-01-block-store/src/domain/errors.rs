//! # Block Store Errors
//!
//! Only persistence and reconciliation surface errors. Simple CRUD converts
//! failures to `None`/`false` at the service boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockStoreError {
    #[error("I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// The persisted index could not be decoded.
    #[error("Corrupt index at {path}: {message}")]
    CorruptIndex { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Block store has been disposed")]
    Disposed,
}

impl BlockStoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        BlockStoreError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = BlockStoreError::io(
            "/tmp/blocks.idx",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/blocks.idx"));
        assert!(msg.contains("denied"));
    }
}
