//! VMI agent - per-node VMI network observability agent
//!
//! Runs as a DaemonSet, exports KubeVirt VMI stats derived from a cluster
//! snapshot and resolves the pod links behind VMI networks.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vmi_agent::{api, config::AgentConfig};
use vmi_agent_lib::{
    health::{Component, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    snapshot::{ReloadLoopBuilder, SnapshotStore, SnapshotWatcher},
    SysfsNetworkHandler, VmiStatsCollector,
};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting vmi-agent");

    let config = AgentConfig::load()?;
    info!(node_name = %config.node_name, snapshot = %config.snapshot_path, "Agent configured");

    let health_registry = HealthRegistry::new();
    for component in Component::ALL {
        health_registry.register(component).await;
    }

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, &config.snapshot_path);

    let store = SnapshotStore::new(&config.snapshot_path);
    let (trigger_tx, trigger_rx) = mpsc::channel(1);
    let reload_loop = ReloadLoopBuilder::new()
        .store(store.clone())
        .health(health_registry.clone())
        .metrics(metrics.clone())
        .logger(logger.clone())
        .interval(Duration::from_secs(config.reload_interval_secs))
        .triggers(trigger_rx)
        .build()
        .context("Failed to build snapshot reload loop")?;

    // A missing snapshot at startup is not fatal; the reload loop retries and
    // readiness follows the first successful load
    if !reload_loop.reload_once().await {
        warn!(path = %config.snapshot_path, "Initial snapshot load failed");
    }

    let _watcher = if config.watch_snapshot {
        match SnapshotWatcher::new(&config.snapshot_path, trigger_tx).start() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Snapshot watcher unavailable, relying on periodic reload");
                None
            }
        }
    } else {
        None
    };

    match VmiStatsCollector::new(store.clone(), config.stats_config(), metrics.clone())
        .and_then(VmiStatsCollector::register)
    {
        Ok(()) => health_registry.set_healthy(Component::Exporter).await,
        Err(e) => {
            health_registry
                .set_unhealthy(Component::Exporter, e.to_string())
                .await
        }
    }

    let handler = Arc::new(SysfsNetworkHandler::new(&config.sysfs_net_root));
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        logger.clone(),
        store,
        handler,
        config.stats_config(),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let reload_handle = tokio::spawn(reload_loop.run(shutdown_tx.subscribe()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            let reason = match result {
                Ok(Ok(())) => "API server exited".to_string(),
                Ok(Err(e)) => format!("API server failed: {}", e),
                Err(e) => format!("API server task failed: {}", e),
            };
            logger.log_shutdown(&reason);
        }
    }

    let _ = shutdown_tx.send(());
    let _ = reload_handle.await;
    info!("Shutting down");

    Ok(())
}
