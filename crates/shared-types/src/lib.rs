//! # Shared Types Crate
//!
//! Value types shared by every MV-FS subsystem.
//!
//! ## Contents
//!
//! - **entities**: `BlockRecord`, `NodeBlockRecord`, `LocationRecord`,
//!   `ServerBlockRecord` and the `RecordVariant` sum type that replaces the
//!   record class chain.
//! - **distance**: hierarchical distance between dotted node identifiers.
//! - **codec**: the compact, backward compatible binary wire form used for
//!   inter-node block transfer.
//! - **config**: `FsConfig`, read from the process environment.
//! - **block_source**: the trait a data node exposes to catalog reconciliation.

pub mod block_source;
pub mod codec;
pub mod config;
pub mod distance;
pub mod entities;
pub mod errors;

pub use block_source::BlockSource;
pub use codec::{WireFormat, VERSION_SENTINEL};
pub use config::FsConfig;
pub use distance::{distance, rank_by_distance, NodeDistance};
pub use entities::*;
pub use errors::CodecError;
