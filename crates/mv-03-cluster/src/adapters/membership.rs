//! # In-Process Cluster
//!
//! Membership over coordinators living in the same process. Each submitted
//! job runs on its own named thread and reports through a channel.

use parking_lot::RwLock;
use shared_types::NodeId;
use std::collections::BTreeMap;
use std::sync::{mpsc, Arc, Weak};
use std::thread;
use tracing::debug;

use crate::domain::errors::ClusterError;
use crate::domain::job::{ClusterJob, JobHandle};
use crate::ports::inbound::ClusterJobRunner;
use crate::ports::outbound::ClusterMembership;

/// Members are held weakly; a dropped coordinator leaves on its own.
#[derive(Default)]
pub struct InProcessCluster {
    members: RwLock<BTreeMap<NodeId, Weak<dyn ClusterJobRunner>>>,
}

impl InProcessCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `runner` under its node id, replacing any earlier member.
    pub fn join(&self, runner: Arc<dyn ClusterJobRunner>) {
        let node = runner.node_id().clone();
        debug!("[mv-03] {} joined the cluster", node);
        self.members.write().insert(node, Arc::downgrade(&runner));
    }

    pub fn leave(&self, node: &NodeId) -> bool {
        self.members.write().remove(node).is_some()
    }

    fn runner(&self, node: &NodeId) -> Option<Arc<dyn ClusterJobRunner>> {
        self.members.read().get(node).and_then(Weak::upgrade)
    }
}

impl ClusterMembership for InProcessCluster {
    fn members(&self) -> Vec<NodeId> {
        self.members
            .read()
            .iter()
            .filter(|(_, runner)| runner.strong_count() > 0)
            .map(|(node, _)| node.clone())
            .collect()
    }

    fn submit(&self, member: &NodeId, job: ClusterJob) -> Result<JobHandle, ClusterError> {
        let runner = self.runner(member).ok_or_else(|| ClusterError::MemberFailed {
            member: member.clone(),
            message: "not a cluster member".into(),
        })?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("mv-03-job-{}", member))
            .spawn(move || {
                // The initiator may have stopped waiting.
                let _ = tx.send(runner.run_job(job));
            })
            .map_err(|e| ClusterError::MemberFailed {
                member: member.clone(),
                message: e.to_string(),
            })?;

        Ok(JobHandle::new(member.clone(), rx))
    }
}

impl std::fmt::Debug for InProcessCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessCluster")
            .field("members", &self.members())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingRunner {
        node: NodeId,
        runs: AtomicUsize,
        fail: bool,
    }

    impl CountingRunner {
        fn new(node: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                node: NodeId::from(node),
                runs: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl ClusterJobRunner for CountingRunner {
        fn node_id(&self) -> &NodeId {
            &self.node
        }

        fn run_job(&self, _job: ClusterJob) -> Result<(), ClusterError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ClusterError::MemberFailed {
                    member: self.node.clone(),
                    message: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_jobs_run_on_members() {
        let cluster = InProcessCluster::new();
        let ok = CountingRunner::new("rack1.n1", false);
        let bad = CountingRunner::new("rack1.n2", true);
        cluster.join(ok.clone());
        cluster.join(bad.clone());

        assert_eq!(
            cluster.members(),
            vec![NodeId::from("rack1.n1"), NodeId::from("rack1.n2")]
        );

        let timeout = Duration::from_secs(5);
        assert!(cluster
            .submit(ok.node_id(), ClusterJob::Refresh)
            .unwrap()
            .wait(timeout)
            .is_ok());
        assert!(cluster
            .submit(bad.node_id(), ClusterJob::Refresh)
            .unwrap()
            .wait(timeout)
            .is_err());
        assert_eq!(ok.runs.load(Ordering::SeqCst), 1);
        assert_eq!(bad.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_member_leaves() {
        let cluster = InProcessCluster::new();
        let runner = CountingRunner::new("rack1.n1", false);
        cluster.join(runner.clone());
        drop(runner);

        assert!(cluster.members().is_empty());
        assert!(cluster
            .submit(&NodeId::from("rack1.n1"), ClusterJob::Refresh)
            .is_err());
        assert!(cluster.leave(&NodeId::from("rack1.n1")));
    }
}
