//! # Cluster Coordinator Service
//!
//! One coordinator per process, built at startup and handed to collaborators
//! by `Arc`. Teardown is the explicit `shutdown` call.

#[cfg(test)]
mod tests;

use mv_01_block_store::{BlockStore, BlockStoreApi};
use mv_02_metadata_catalog::{MetadataCatalog, MetadataCatalogApi, RefreshReport};
use parking_lot::{Mutex, RwLock};
use shared_types::{BlockSource, FsConfig, NodeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::adapters::{FileNamedLock, InProcessCluster, LocalServerElection};
use crate::domain::errors::ClusterError;
use crate::domain::job::{ClusterJob, ClusterRefreshSummary};
use crate::domain::role::NodeRole;
use crate::ports::inbound::ClusterJobRunner;
use crate::ports::outbound::{ClusterMembership, NamedLock, RoleElector};

/// Cluster lock serialising metadata reloads.
pub const UPDATE_LOCK: &str = "mv.fs.update";

/// Dependencies for `ClusterCoordinator`.
#[derive(Clone)]
pub struct ClusterDependencies {
    pub lock: Arc<dyn NamedLock>,
    pub membership: Arc<dyn ClusterMembership>,
    pub elector: Arc<dyn RoleElector>,
}

/// Services of the process, built once each.
#[derive(Default)]
struct Roles {
    store: Option<Arc<BlockStore>>,
    server: Option<Arc<NodeRole>>,
    data: Option<Arc<NodeRole>>,
}

/// Role resolution and cluster-wide refresh.
pub struct ClusterCoordinator {
    config: FsConfig,
    deps: ClusterDependencies,
    roles: RwLock<Roles>,
    /// Serialises role construction.
    init: Mutex<()>,
    shut_down: AtomicBool,
}

impl ClusterCoordinator {
    pub fn new(config: FsConfig, deps: ClusterDependencies) -> Self {
        Self {
            config,
            deps,
            roles: RwLock::new(Roles::default()),
            init: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Single-process deployment: file locks under `lock_dir`, an in-process
    /// cluster containing only this coordinator, and a local server election.
    pub fn standalone(config: FsConfig) -> Result<Arc<Self>, ClusterError> {
        let cluster = Arc::new(InProcessCluster::new());
        let deps = ClusterDependencies {
            lock: Arc::new(FileNamedLock::new(config.lock_dir())?),
            membership: cluster.clone(),
            elector: Arc::new(LocalServerElection),
        };
        let coordinator = Arc::new(Self::new(config, deps));
        cluster.join(coordinator.clone());
        Ok(coordinator)
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn node_id(&self) -> &NodeId {
        &self.config.node_id
    }

    pub fn is_server_node(&self) -> bool {
        self.deps.elector.is_server_node(&self.config.node_id)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn check_running(&self) -> Result<(), ClusterError> {
        if self.is_shut_down() {
            Err(ClusterError::ShutDown)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // ROLES
    // =========================================================================

    /// The elected role of this process.
    pub fn role(&self) -> Result<Arc<NodeRole>, ClusterError> {
        if self.is_server_node() {
            self.server()
        } else {
            self.data_node()
        }
    }

    /// The server role, built on first use. `NotServerNode` unless this
    /// process is the elected server.
    pub fn server(&self) -> Result<Arc<NodeRole>, ClusterError> {
        self.check_running()?;
        if let Some(role) = &self.roles.read().server {
            return Ok(Arc::clone(role));
        }
        if !self.is_server_node() {
            return Err(ClusterError::NotServerNode(self.config.node_id.clone()));
        }

        let _init = self.init.lock();
        if let Some(role) = &self.roles.read().server {
            return Ok(Arc::clone(role));
        }
        let store = self.local_store()?;
        let catalog = Arc::new(MetadataCatalog::open(&self.config)?);
        let role = Arc::new(NodeRole::server(
            self.config.node_id.clone(),
            catalog,
            store,
        ));
        self.roles.write().server = Some(Arc::clone(&role));
        info!("[mv-03] Server role ready on {}", self.config.node_id);
        Ok(role)
    }

    /// The data-node role, built on first use. Every process stores blocks,
    /// so this is available on the server as well.
    pub fn data_node(&self) -> Result<Arc<NodeRole>, ClusterError> {
        self.check_running()?;
        if let Some(role) = &self.roles.read().data {
            return Ok(Arc::clone(role));
        }

        let _init = self.init.lock();
        if let Some(role) = &self.roles.read().data {
            return Ok(Arc::clone(role));
        }
        let store = self.local_store()?;
        let role = Arc::new(NodeRole::data(self.config.node_id.clone(), store));
        self.roles.write().data = Some(Arc::clone(&role));
        info!("[mv-03] Data role ready on {}", self.config.node_id);
        Ok(role)
    }

    /// Shared block store of this node. Caller holds `init`.
    fn local_store(&self) -> Result<Arc<BlockStore>, ClusterError> {
        if let Some(store) = &self.roles.read().store {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(BlockStore::open(
            &self.config,
            self.config.node_id.clone(),
        )?);
        self.roles.write().store = Some(Arc::clone(&store));
        Ok(store)
    }

    // =========================================================================
    // REFRESH
    // =========================================================================

    /// Reload the catalog against the local block store while holding the
    /// cluster-wide update lock.
    pub fn refresh(&self) -> Result<RefreshReport, ClusterError> {
        let role = self.server()?;
        let Some(catalog) = role.catalog() else {
            return Err(ClusterError::NotServerNode(self.config.node_id.clone()));
        };

        let _lock = self.deps.lock.lock(UPDATE_LOCK)?;
        let sources: [&dyn BlockSource; 1] = [role.store().as_ref()];
        let report = catalog.refresh(&sources, true)?;
        info!(
            "[mv-03] 🔄 Refreshed catalog: {} files, {} blocks attached",
            report.files_loaded, report.attached
        );
        Ok(report)
    }

    /// Submit a refresh job to every member. With `wait`, block on each for at
    /// most `job_timeout`; member failures are logged and counted.
    pub fn refresh_cluster(&self, wait: bool) -> ClusterRefreshSummary {
        let mut summary = ClusterRefreshSummary::default();
        if self.is_shut_down() {
            return summary;
        }

        let mut handles = Vec::new();
        for member in self.deps.membership.members() {
            match self.deps.membership.submit(&member, ClusterJob::Refresh) {
                Ok(handle) => {
                    summary.submitted += 1;
                    handles.push(handle);
                }
                Err(e) => {
                    error!("[mv-03] Failed to submit refresh to {}: {}", member, e);
                    summary.failed += 1;
                }
            }
        }
        if !wait {
            return summary;
        }

        let timeout = self.config.job_timeout();
        for handle in handles {
            let member = handle.member().clone();
            match handle.wait(timeout) {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    warn!("[mv-03] ⚠️ Refresh on {} failed: {}", member, e);
                    summary.failed += 1;
                }
            }
        }
        info!(
            "[mv-03] Cluster refresh: {}/{} members succeeded",
            summary.succeeded, summary.submitted
        );
        summary
    }

    /// Dispose every built role. Later role lookups fail with `ShutDown`.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let _init = self.init.lock();
        let roles = std::mem::take(&mut *self.roles.write());
        match (&roles.server, &roles.store) {
            (Some(server), _) => server.dispose(),
            (None, Some(store)) => store.dispose(),
            (None, None) => {}
        }
        info!("[mv-03] Coordinator on {} shut down", self.config.node_id);
    }
}

impl ClusterJobRunner for ClusterCoordinator {
    fn node_id(&self) -> &NodeId {
        &self.config.node_id
    }

    fn run_job(&self, job: ClusterJob) -> Result<(), ClusterError> {
        match job {
            ClusterJob::Refresh if self.is_server_node() => self.refresh().map(|_| ()),
            ClusterJob::Refresh => {
                let role = self.data_node()?;
                let report = role.store().refresh(true)?;
                role.store().save()?;
                info!(
                    "[mv-03] Data node rescan: +{} -{} ~{}",
                    report.added, report.removed, report.changed
                );
                Ok(())
            }
        }
    }
}
