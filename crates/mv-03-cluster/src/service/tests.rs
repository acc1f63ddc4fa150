//! # Cluster Coordinator Tests

use super::*;
use crate::adapters::{DesignatedServer, LocalNamedLock};
use crate::domain::role::RoleKind;
use shared_types::{BlockId, BlockRecord};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn config(dir: &TempDir, node: &str) -> FsConfig {
    FsConfig::default()
        .with_work_root(dir.path())
        .with_node_id(node)
        .with_job_timeout(Duration::from_secs(10))
}

fn cluster_deps(
    locks: &LocalNamedLock,
    cluster: &Arc<InProcessCluster>,
    server: &str,
) -> ClusterDependencies {
    ClusterDependencies {
        lock: Arc::new(locks.clone()),
        membership: cluster.clone(),
        elector: Arc::new(DesignatedServer(NodeId::from(server))),
    }
}

fn join(
    cluster: &Arc<InProcessCluster>,
    config: FsConfig,
    deps: ClusterDependencies,
) -> Arc<ClusterCoordinator> {
    let coordinator = Arc::new(ClusterCoordinator::new(config, deps));
    cluster.join(coordinator.clone());
    coordinator
}

struct FailingMember(NodeId);

impl ClusterJobRunner for FailingMember {
    fn node_id(&self) -> &NodeId {
        &self.0
    }

    fn run_job(&self, _job: ClusterJob) -> Result<(), ClusterError> {
        Err(ClusterError::MemberFailed {
            member: self.0.clone(),
            message: "disk unavailable".into(),
        })
    }
}

// =============================================================================
// ROLES
// =============================================================================

#[test]
fn test_server_role_is_built_once() {
    let dir = TempDir::new().unwrap();
    let coordinator = ClusterCoordinator::standalone(config(&dir, "rack1.n1")).unwrap();

    let first = coordinator.server().unwrap();
    let second = coordinator.server().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.kind(), RoleKind::Server);
    assert!(first.catalog().is_some());

    let data = coordinator.data_node().unwrap();
    assert_eq!(data.kind(), RoleKind::Data);
    assert!(Arc::ptr_eq(data.store(), first.store()));
    assert!(Arc::ptr_eq(&coordinator.role().unwrap(), &first));
}

#[test]
fn test_concurrent_role_lookups_share_one_instance() {
    let dir = TempDir::new().unwrap();
    let coordinator = ClusterCoordinator::standalone(config(&dir, "rack1.n1")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.server().unwrap())
        })
        .collect();
    let roles: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(roles.iter().all(|r| Arc::ptr_eq(r, &roles[0])));
}

#[test]
fn test_data_node_has_no_server_role() {
    let dir = TempDir::new().unwrap();
    let cluster = Arc::new(InProcessCluster::new());
    let deps = cluster_deps(&LocalNamedLock::new(), &cluster, "rack1.n1");
    let coordinator = join(&cluster, config(&dir, "rack2.n1"), deps);

    assert!(!coordinator.is_server_node());
    assert_eq!(
        coordinator.server().unwrap_err(),
        ClusterError::NotServerNode(NodeId::from("rack2.n1"))
    );
    let role = coordinator.role().unwrap();
    assert_eq!(role.kind(), RoleKind::Data);
    assert!(role.catalog().is_none());
    assert!(matches!(
        coordinator.refresh(),
        Err(ClusterError::NotServerNode(_))
    ));
}

// =============================================================================
// REFRESH
// =============================================================================

#[test]
fn test_refresh_links_local_blocks() {
    let dir = TempDir::new().unwrap();
    let coordinator = ClusterCoordinator::standalone(config(&dir, "rack1.n1")).unwrap();
    let role = coordinator.server().unwrap();
    let catalog = role.catalog().unwrap();

    role.store()
        .add(&BlockRecord::new("report1.bin", "blk-a", 5), b"hello")
        .unwrap();
    catalog
        .add("report1.bin", vec![BlockRecord::new("", "blk-a", 5)])
        .unwrap();

    let report = coordinator.refresh().unwrap();
    assert_eq!(report.files_loaded, 1);
    assert_eq!(report.attached, 1);

    let file = catalog.get("report1.bin").unwrap();
    assert_eq!(file.is_block_ready(&BlockId::from("blk-a")), Some(true));
}

#[test]
fn test_refresh_waits_for_update_lock() {
    let dir = TempDir::new().unwrap();
    let locks = LocalNamedLock::new();
    let cluster = Arc::new(InProcessCluster::new());
    let deps = cluster_deps(&locks, &cluster, "rack1.n1");
    let coordinator = join(&cluster, config(&dir, "rack1.n1"), deps);
    coordinator.server().unwrap();

    let held = locks.lock(UPDATE_LOCK).unwrap();
    let (tx, rx) = mpsc::channel();
    let refresher = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            let result = coordinator.refresh();
            tx.send(()).unwrap();
            result
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    drop(held);
    rx.recv_timeout(Duration::from_secs(5))
        .expect("refresh never acquired the update lock");
    assert!(refresher.join().unwrap().is_ok());
    assert!(!locks.is_locked(UPDATE_LOCK));
}

#[test]
fn test_refresh_cluster_reaches_every_member() {
    let dir = TempDir::new().unwrap();
    let locks = LocalNamedLock::new();
    let cluster = Arc::new(InProcessCluster::new());

    let server = join(
        &cluster,
        config(&dir, "rack1.n1"),
        cluster_deps(&locks, &cluster, "rack1.n1"),
    );
    let data = join(
        &cluster,
        config(&dir, "rack2.n1"),
        cluster_deps(&locks, &cluster, "rack1.n1"),
    );

    let summary = server.refresh_cluster(true);
    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.succeeded, 2);
    assert!(summary.is_complete());

    // The data node rescanned and persisted its store.
    let store = data.data_node().unwrap();
    assert!(store.store().layout().index_path().exists());
}

#[test]
fn test_member_failure_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let cluster = Arc::new(InProcessCluster::new());
    let server = join(
        &cluster,
        config(&dir, "rack1.n1"),
        cluster_deps(&LocalNamedLock::new(), &cluster, "rack1.n1"),
    );
    let failing = Arc::new(FailingMember(NodeId::from("rack3.n1")));
    cluster.join(failing.clone());

    let summary = server.refresh_cluster(true);
    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(!summary.is_complete());

    let summary = server.refresh_cluster(false);
    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.succeeded, 0);
}

#[test]
fn test_shutdown_disposes_roles() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, "rack1.n1");
    let coordinator = ClusterCoordinator::standalone(cfg.clone()).unwrap();
    let role = coordinator.server().unwrap();
    role.catalog()
        .unwrap()
        .add("kept.bin", vec![BlockRecord::new("", "k1", 1)])
        .unwrap();

    coordinator.shutdown();
    assert!(coordinator.is_shut_down());
    assert_eq!(coordinator.server().unwrap_err(), ClusterError::ShutDown);
    assert_eq!(coordinator.refresh_cluster(true), ClusterRefreshSummary::default());
    assert!(role.store().is_disposed());

    let reopened = MetadataCatalog::open(&cfg).unwrap();
    assert!(reopened.contains("kept.bin"));
}
