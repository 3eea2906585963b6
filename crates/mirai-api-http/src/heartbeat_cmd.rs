use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mah_config::ConfigWatcher;
use mah_delivery::{HeartbeatScheduler, HttpTransport};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config_cmds::open_store;

pub(crate) async fn handle_heartbeat(path: &Path, timeout: Duration) -> Result<()> {
    let store = open_store(path)?;
    let _watcher = ConfigWatcher::start(store.clone(), path)?;
    let transport = Arc::new(HttpTransport::new(timeout)?);

    if !store.snapshot().heartbeat.is_enabled() {
        warn!("heartbeat is disabled; waiting for the setting file to enable it");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = HeartbeatScheduler::new(store.subscribe(), transport);
    let task = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down heartbeat");
    let _ = shutdown_tx.send(true);
    task.await.context("heartbeat task failed")?;
    Ok(())
}
