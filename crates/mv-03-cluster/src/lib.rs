//! # Cluster Coordination (mv-03)
//!
//! Decides which role this process plays and serialises cluster-wide metadata
//! reloads.
//!
//! ## Roles
//!
//! | Role | Holds | Elected when |
//! |------|-------|--------------|
//! | server | `MetadataCatalog` + local `BlockStore` | `RoleElector::is_server_node` is true |
//! | data node | local `BlockStore` | otherwise |
//!
//! Roles are built lazily, once, on first use.
//!
//! ## Refresh
//!
//! ```text
//! refresh()               refresh_cluster(wait)
//!    │                          │
//!    ├─ lock "mv.fs.update"     ├─ submit Refresh to every member
//!    ├─ catalog.refresh(store)  └─ wait ≤ job_timeout per member (optional)
//!    └─ unlock                      failures are logged, never raised
//! ```
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - `NodeRole`, jobs and job handles, errors
//! - `ports/` - `ClusterJobRunner` (inbound), `NamedLock`, `ClusterMembership`,
//!   `RoleElector` (outbound)
//! - `adapters/` - in-process and file-backed named locks, in-process
//!   membership, local election
//! - `service/` - `ClusterCoordinator`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{
    DesignatedServer, FileNamedLock, InProcessCluster, LocalNamedLock, LocalServerElection,
};
pub use domain::errors::ClusterError;
pub use domain::job::{ClusterJob, ClusterRefreshSummary, JobHandle};
pub use domain::role::{NodeRole, RoleKind};
pub use ports::inbound::ClusterJobRunner;
pub use ports::outbound::{ClusterLockGuard, ClusterMembership, NamedLock, RoleElector};
pub use service::{ClusterCoordinator, ClusterDependencies, UPDATE_LOCK};
