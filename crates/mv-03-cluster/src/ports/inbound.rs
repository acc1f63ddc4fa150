//! # Inbound Ports (Driving Ports)

use shared_types::NodeId;

use crate::domain::errors::ClusterError;
use crate::domain::job::ClusterJob;

/// A cluster member able to execute broadcast jobs.
pub trait ClusterJobRunner: Send + Sync {
    fn node_id(&self) -> &NodeId;

    fn run_job(&self, job: ClusterJob) -> Result<(), ClusterError>;
}
