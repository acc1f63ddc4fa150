//! # MV-FS Node Runtime
//!
//! Wires one MV-FS process together.
//!
//! ## Startup Sequence
//!
//! 1. Load `FsConfig` from `MVFS_*` environment variables
//! 2. Install logging (`MVFS_LOG`, default `info`)
//! 3. Build the `ClusterCoordinator` and resolve this process's role
//! 4. Startup refresh: the server reloads its catalog under the cluster update
//!    lock; a data node rescans its block store
//! 5. Every `job_check_period`: refresh the local block store (rescan only
//!    when its index is stale) and save the index
//! 6. On Ctrl+C: shut the coordinator down, persisting catalog and index

use std::sync::Arc;

use anyhow::{Context, Result};
use mv_01_block_store::{BlockStoreApi, ScanReport};
use mv_03_cluster::ClusterCoordinator;
use shared_types::FsConfig;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "MVFS_LOG";

/// Install the global `tracing` subscriber. `filter` uses `EnvFilter` syntax;
/// `None` means `info`.
pub fn init_logging(filter: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_new(filter.unwrap_or("info"))
        .with_context(|| format!("invalid {} filter", LOG_ENV))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// The running node.
pub struct NodeRuntime {
    coordinator: Arc<ClusterCoordinator>,
}

impl NodeRuntime {
    pub fn new(config: FsConfig) -> Result<Self> {
        let coordinator = ClusterCoordinator::standalone(config)
            .context("failed to build the cluster coordinator")?;
        Ok(Self { coordinator })
    }

    pub fn coordinator(&self) -> &Arc<ClusterCoordinator> {
        &self.coordinator
    }

    /// Resolve the role and run the startup refresh.
    pub fn start(&self) -> Result<()> {
        let config = self.coordinator.config();
        info!("===========================================");
        info!("  MV-FS Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("  Node: {}", config.node_id);
        info!("  Work root: {}", config.work_root.display());
        info!("===========================================");

        let role = self.coordinator.role().context("failed to resolve node role")?;
        if role.is_server() {
            let report = self.coordinator.refresh().context("startup refresh failed")?;
            info!(
                "Server ready: {} files, {} blocks linked, {} orphans",
                report.files_loaded,
                report.attached,
                report.orphans.len()
            );
        } else {
            let report = role.store().refresh(true).context("startup rescan failed")?;
            info!("Data node ready: {} blocks ({:?})", role.store().len(), report);
        }
        Ok(())
    }

    /// One pass of the periodic block-store maintenance.
    pub fn maintain(&self) -> Result<ScanReport> {
        let role = self.coordinator.data_node()?;
        let store = role.store();
        let report = store.refresh(false).context("block store refresh failed")?;
        store.save().context("block store save failed")?;
        Ok(report)
    }

    pub fn shutdown(&self) {
        info!("Shutting down node {}", self.coordinator.node_id());
        self.coordinator.shutdown();
    }
}
