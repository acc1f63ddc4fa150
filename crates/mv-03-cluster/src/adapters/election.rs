//! Role election strategies.

use shared_types::NodeId;

use crate::ports::outbound::RoleElector;

/// Every process is its own server. Single-node deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalServerElection;

impl RoleElector for LocalServerElection {
    fn is_server_node(&self, _node: &NodeId) -> bool {
        true
    }
}

/// One fixed node is the server; every other node is a data node.
#[derive(Debug, Clone)]
pub struct DesignatedServer(pub NodeId);

impl RoleElector for DesignatedServer {
    fn is_server_node(&self, node: &NodeId) -> bool {
        *node == self.0
    }
}
