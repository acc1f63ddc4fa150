//! # FsConfig
//!
//! Process-wide tuning for the block store, the catalog and cluster jobs.
//! Defaults suit a single-node deployment; `from_env` applies `MVFS_*`
//! overrides.

use std::path::PathBuf;
use std::time::Duration;

use crate::entities::NodeId;

/// Filesystem configuration.
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Desktop deployments never split files into multiple blocks.
    pub desktop: bool,
    /// Root under which every node, the catalog and the lock files live.
    pub work_root: PathBuf,
    /// Target block size in bytes.
    pub block_size: u64,
    /// How long a cluster job may run before the initiator stops waiting.
    pub job_timeout: Duration,
    /// Period of the background maintenance loop.
    pub job_check_period: Duration,
    /// Age after which a block store's in-memory index is considered stale.
    pub map_expired: Duration,
    /// Replica capacity of each server block.
    pub max_replicas: usize,
    /// Identity of this process in the cluster.
    pub node_id: NodeId,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            desktop: false,
            work_root: PathBuf::from("./mvfs-data"),
            block_size: 64 * 1024 * 1024, // 64 MiB
            job_timeout: Duration::from_secs(60),
            job_check_period: Duration::from_secs(5),
            map_expired: Duration::from_secs(600),
            max_replicas: 1,
            node_id: NodeId::from("local.node0"),
        }
    }
}

impl FsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by any `MVFS_*` variables present in the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("MVFS_DESKTOP") {
            match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.desktop = true,
                "0" | "false" | "no" => config.desktop = false,
                _ => tracing::warn!("[mvfs] Ignoring MVFS_DESKTOP={}", value),
            }
        }
        if let Some(dir) = lookup("MVFS_WORK_DIR") {
            config.work_root = PathBuf::from(dir);
        }
        if let Some(size) = parse_u64(&lookup, "MVFS_BLOCK_SIZE") {
            if size > 0 {
                config.block_size = size;
            } else {
                tracing::warn!("[mvfs] MVFS_BLOCK_SIZE must be positive");
            }
        }
        if let Some(ms) = parse_u64(&lookup, "MVFS_JOB_TIMEOUT_MS") {
            config.job_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "MVFS_JOB_CHECK_PERIOD_MS") {
            config.job_check_period = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "MVFS_MAP_EXPIRED_MS") {
            config.map_expired = Duration::from_millis(ms);
        }
        if let Some(replicas) = parse_u64(&lookup, "MVFS_REPLICAS") {
            config.max_replicas = (replicas as usize).max(1);
        }
        if let Some(node) = lookup("MVFS_NODE_ID") {
            config.node_id = NodeId::new(node);
        }

        config
    }

    pub fn is_desktop(&self) -> bool {
        self.desktop
    }

    pub fn job_timeout(&self) -> Duration {
        self.job_timeout
    }

    pub fn job_check_period(&self) -> Duration {
        self.job_check_period
    }

    pub fn map_expired(&self) -> Duration {
        self.map_expired
    }

    /// Physical root of a node's blocks.
    pub fn work_dir(&self, node_id: &NodeId) -> PathBuf {
        self.work_root.join(node_id.as_str())
    }

    /// Directory holding one XML document per logical file.
    pub fn catalog_dir(&self) -> PathBuf {
        self.work_root.join("catalog")
    }

    /// Directory holding cluster lock files.
    pub fn lock_dir(&self) -> PathBuf {
        self.work_root.join("locks")
    }

    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    pub fn with_desktop(mut self, desktop: bool) -> Self {
        self.desktop = desktop;
        self
    }

    pub fn with_block_size(mut self, size: u64) -> Self {
        self.block_size = size.max(1);
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_map_expired(mut self, age: Duration) -> Self {
        self.map_expired = age;
        self
    }

    pub fn with_max_replicas(mut self, replicas: usize) -> Self {
        self.max_replicas = replicas.max(1);
        self
    }

    pub fn with_node_id(mut self, node: impl Into<NodeId>) -> Self {
        self.node_id = node.into();
        self
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("[mvfs] Ignoring {}={} (not a number)", key, raw);
            None
        }
    }
}
