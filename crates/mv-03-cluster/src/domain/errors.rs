//! # Cluster Errors

use mv_01_block_store::BlockStoreError;
use mv_02_metadata_catalog::CatalogError;
use shared_types::NodeId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// The cluster-wide named lock could not be acquired.
    #[error("Failed to acquire cluster lock `{name}`: {message}")]
    LockFailed { name: String, message: String },

    #[error("Cluster member {member} failed: {message}")]
    MemberFailed { member: NodeId, message: String },

    #[error("Cluster member {member} did not answer within {after:?}")]
    Timeout { member: NodeId, after: Duration },

    /// A server-only operation was requested on a data node.
    #[error("Node {0} is not the elected server")]
    NotServerNode(NodeId),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Block store error: {0}")]
    Store(#[from] BlockStoreError),

    #[error("Cluster coordinator has been shut down")]
    ShutDown,
}
