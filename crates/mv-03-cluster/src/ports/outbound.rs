//! # Outbound Ports (Driven Ports)
//!
//! What the coordinator requires from the cluster it runs in.

use shared_types::NodeId;

use crate::domain::errors::ClusterError;
use crate::domain::job::{ClusterJob, JobHandle};

/// Held cluster-wide lock; released on drop.
#[must_use = "the cluster lock is released as soon as the guard is dropped"]
pub struct ClusterLockGuard {
    name: String,
    _hold: Box<dyn Send>,
}

impl ClusterLockGuard {
    /// Wrap an adapter-specific hold whose `Drop` releases the lock.
    pub fn new(name: impl Into<String>, hold: Box<dyn Send>) -> Self {
        Self {
            name: name.into(),
            _hold: hold,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ClusterLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterLockGuard").field("name", &self.name).finish()
    }
}

/// Cluster-wide mutual exclusion keyed by name.
pub trait NamedLock: Send + Sync {
    /// Block until the lock is held.
    fn lock(&self, name: &str) -> Result<ClusterLockGuard, ClusterError>;

    /// `None` if someone else holds the lock.
    fn try_lock(&self, name: &str) -> Result<Option<ClusterLockGuard>, ClusterError>;
}

/// Membership listing and job submission.
pub trait ClusterMembership: Send + Sync {
    fn members(&self) -> Vec<NodeId>;

    fn submit(&self, member: &NodeId, job: ClusterJob) -> Result<JobHandle, ClusterError>;
}

/// Decides whether a node plays the server role.
pub trait RoleElector: Send + Sync {
    fn is_server_node(&self, node: &NodeId) -> bool;
}
