//! # MV-FS Node
//!
//! Entry point of an MV-FS process. See the `node_runtime` library for the
//! startup sequence.

use std::sync::Arc;

use anyhow::Result;
use node_runtime::{init_logging, NodeRuntime, LOG_ENV};
use shared_types::FsConfig;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(std::env::var(LOG_ENV).ok().as_deref())?;

    let config = FsConfig::from_env();
    let period = config.job_check_period();

    let runtime = Arc::new(tokio::task::spawn_blocking(move || -> Result<NodeRuntime> {
        let runtime = NodeRuntime::new(config)?;
        runtime.start()?;
        Ok(runtime)
    })
    .await??);

    info!("Node is running. Press Ctrl+C to stop.");
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let runtime = Arc::clone(&runtime);
                match tokio::task::spawn_blocking(move || runtime.maintain()).await? {
                    Ok(report) if report != Default::default() => {
                        info!("[mv-01] Maintenance rescan: {:?}", report);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Maintenance pass failed: {:#}", e),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    tokio::task::spawn_blocking(move || runtime.shutdown()).await?;
    Ok(())
}
