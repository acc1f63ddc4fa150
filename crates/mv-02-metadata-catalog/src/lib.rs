//! # Metadata Catalog (mv-02)
//!
//! Authoritative server-node mapping of logical file names to their ordered
//! block sequences, the per-block statistics used by the materialized-view
//! engine, and the link from every block to its physical replicas.
//!
//! ## Locking
//!
//! | Lock | Guards | Held across |
//! |------|--------|-------------|
//! | catalog map (`RwLock`) | name → file | lookups only |
//! | `FileLock` (per file, reentrant) | block sequence, version | one structural mutation and its persistence |
//! | `ReplicaSet` mutex (per block) | locations, readiness | one attach or check |
//!
//! A readiness wait drops every hold the calling thread has on the file's
//! `FileLock` and restores the exact depth afterwards, so the thread attaching
//! the location can take the write lock.
//!
//! ## Persistence
//!
//! One XML document per logical file, rewritten after every structural
//! mutation. Locations are never persisted; they come back from the data
//! nodes through `refresh`.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - `LogicalFile`, `FileLock`, block planning, record conditions
//! - `ports/` - `MetadataCatalogApi` (inbound), `CatalogPersistence` (outbound)
//! - `adapters/` - XML codec, directory and in-memory document stores
//! - `service/` - `MetadataCatalog`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::condition::RecordCondition;
pub use domain::document::{BlockDocument, FileDocument};
pub use domain::errors::CatalogError;
pub use domain::lock::{FileLock, LockDepth};
pub use domain::logical_file::{LogicalFile, READINESS_TIMEOUT};
pub use domain::planner::plan_blocks;
pub use domain::report::RefreshReport;
pub use ports::inbound::{FileFilter, MetadataCatalogApi};
pub use ports::outbound::{CatalogPersistence, LoadedDocuments};
pub use service::MetadataCatalog;
