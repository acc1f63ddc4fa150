//! # Adapters
//!
//! - `lock` - in-process and file-backed `NamedLock`s
//! - `membership` - `InProcessCluster`
//! - `election` - `RoleElector`s

pub mod election;
pub mod lock;
pub mod membership;

pub use election::{DesignatedServer, LocalServerElection};
pub use lock::{FileNamedLock, LocalNamedLock};
pub use membership::InProcessCluster;
