//! Read-only view of a data node's block inventory, consumed by catalog
//! reconciliation.

use crate::entities::{NodeBlockRecord, NodeId};

/// A data node's physical block inventory.
pub trait BlockSource: Send + Sync {
    /// Node that holds these blocks.
    fn node_id(&self) -> &NodeId;

    /// Snapshot of every block currently indexed, valid or not.
    fn list_blocks(&self) -> Vec<NodeBlockRecord>;
}
