//! Jobs broadcast to cluster members and the handles used to await them.

use shared_types::NodeId;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use super::errors::ClusterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterJob {
    /// Reload metadata (server) or rescan the block store (data node).
    Refresh,
}

/// Pending result of a job submitted to one member.
#[derive(Debug)]
pub struct JobHandle {
    member: NodeId,
    result: Receiver<Result<(), ClusterError>>,
}

impl JobHandle {
    pub fn new(member: NodeId, result: Receiver<Result<(), ClusterError>>) -> Self {
        Self { member, result }
    }

    pub fn member(&self) -> &NodeId {
        &self.member
    }

    /// Block until the member reports back or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> Result<(), ClusterError> {
        match self.result.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ClusterError::Timeout {
                member: self.member,
                after: timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ClusterError::MemberFailed {
                member: self.member,
                message: "job ended without reporting".into(),
            }),
        }
    }
}

/// Outcome of a broadcast refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterRefreshSummary {
    pub submitted: usize,
    /// Zero when the caller did not wait.
    pub succeeded: usize,
    pub failed: usize,
}

impl ClusterRefreshSummary {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.succeeded == self.submitted
    }
}
