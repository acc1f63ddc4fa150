//! # Block Store (mv-01)
//!
//! Physical block storage owned by a single data node. Every block lives in its
//! own file under the node's work directory; an in-memory index maps block ids
//! to `NodeBlockRecord`s and is persisted next to the blocks.
//!
//! ## Ownership
//!
//! ```text
//! work_dir(node)/
//! ├── blocks/<block_id>.blk     one file per block, owned by this store only
//! └── blocks.idx                bincode index snapshot
//! ```
//!
//! ## Failure Semantics
//!
//! | Operation | On I/O failure |
//! |-----------|----------------|
//! | `add`, `rename`, `remove`, `import_block` | logged, returns `None`/`false`, prior state intact |
//! | `update(id)` | missing file marks the record invalid (`physical_length = -1`) |
//! | `save`, `refresh`, `rescan` | `Err(BlockStoreError)` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - layout, index entries, transfer frames, errors
//! - `ports/` - `BlockStoreApi` (inbound), serializer and checksum SPIs (outbound)
//! - `adapters/` - bincode index serializer, crc32 checksum provider
//! - `service/` - `BlockStore`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::errors::BlockStoreError;
pub use domain::index::{IndexSnapshot, ScanReport, StoreEntry};
pub use domain::layout::StoreLayout;
pub use domain::transfer::TransferFrame;
pub use ports::inbound::BlockStoreApi;
pub use ports::outbound::{ChecksumProvider, IndexSerializer};
pub use service::{BlockStore, BlockStoreDependencies};
