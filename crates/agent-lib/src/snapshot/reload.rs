//! Snapshot reload loop
//!
//! Periodically re-reads the snapshot file with jitter, and immediately
//! when the watcher reports a change.

use super::SnapshotStore;
use crate::health::HealthRegistry;
use crate::observability::{AgentMetrics, StructuredLogger};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ReloadConfig {
    /// Base reload interval (default: 30 seconds)
    pub interval: Duration,
    /// Maximum jitter added to the interval (default: 1 second)
    pub jitter: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
        }
    }
}

pub struct ReloadLoop {
    store: SnapshotStore,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
    config: ReloadConfig,
    triggers: Option<mpsc::Receiver<()>>,
}

impl ReloadLoop {
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting snapshot reload loop"
        );

        let mut ticker = interval(self.current_interval());
        // The first tick fires immediately; the initial load already happened
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reload_once().await;
                    ticker = interval(self.current_interval());
                    ticker.tick().await;
                }
                trigger = next_trigger(&mut self.triggers) => {
                    match trigger {
                        Some(()) => {
                            debug!("Snapshot change detected");
                            self.reload_once().await;
                        }
                        None => {
                            debug!("Snapshot watcher channel closed");
                            self.triggers = None;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down snapshot reload loop");
                    break;
                }
            }
        }
    }

    /// Reload once and record the outcome. Returns true on success.
    pub async fn reload_once(&self) -> bool {
        let start = Instant::now();

        match self.store.reload().await {
            Ok(loaded) => {
                debug!(
                    elapsed_ms = start.elapsed().as_millis(),
                    "Snapshot reload complete"
                );
                self.logger
                    .log_snapshot_loaded(loaded.snapshot.vmis.len(), loaded.skipped_vmis);
                if let Some(at) = loaded.loaded_at {
                    self.metrics.set_snapshot_loaded_at(at.timestamp());
                    self.health.snapshot_loaded(at).await;
                }
                true
            }
            Err(e) => {
                let error = e.to_string();
                self.metrics.inc_snapshot_reload_errors();
                self.logger
                    .log_snapshot_reload_failed(&error, self.store.current().is_loaded());
                self.health.snapshot_failed(&error).await;
                false
            }
        }
    }

    fn current_interval(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }
}

/// Next watcher trigger; pends forever when no watcher is attached
async fn next_trigger(triggers: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match triggers {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Pseudo-random jitter in `0..max_ms`
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

pub struct ReloadLoopBuilder {
    store: Option<SnapshotStore>,
    health: Option<HealthRegistry>,
    metrics: Option<AgentMetrics>,
    logger: Option<StructuredLogger>,
    config: ReloadConfig,
    triggers: Option<mpsc::Receiver<()>>,
}

impl ReloadLoopBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            health: None,
            metrics: None,
            logger: None,
            config: ReloadConfig::default(),
            triggers: None,
        }
    }

    pub fn store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    /// Receive change notifications, usually from a [`super::SnapshotWatcher`]
    pub fn triggers(mut self, triggers: mpsc::Receiver<()>) -> Self {
        self.triggers = Some(triggers);
        self
    }

    pub fn build(self) -> Result<ReloadLoop> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Snapshot store is required"))?;
        if store.path().is_none() {
            anyhow::bail!("Snapshot store has no backing file");
        }
        if self.config.interval.is_zero() {
            anyhow::bail!("Reload interval must be positive");
        }

        Ok(ReloadLoop {
            store,
            health: self.health.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("unknown")),
            config: self.config,
            triggers: self.triggers,
        })
    }
}

impl Default for ReloadLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
