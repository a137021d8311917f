//! Observability infrastructure for the VMI agent
//!
//! Provides:
//! - Prometheus self-metrics (scrape latency, snapshot reloads, link discovery)
//! - Event-tagged structured logging with tracing

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for scrape latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once); `None` if the series could not be built
static GLOBAL_METRICS: OnceLock<Option<AgentMetricsInner>> = OnceLock::new();

struct AgentMetricsInner {
    scrape_latency_seconds: Histogram,
    vmis_reported: IntGauge,
    snapshot_reload_errors: IntCounter,
    snapshot_last_success_timestamp: IntGauge,
    link_discovery_attempts: IntCounter,
    link_discovery_failures: IntCounter,
}

/// Register a collector in the default registry. A failed registration only
/// means the series is not exposed; the handle keeps working.
fn register<C>(collector: C) -> C
where
    C: prometheus::core::Collector + Clone + 'static,
{
    if let Err(e) = prometheus::register(Box::new(collector.clone())) {
        warn!(error = %e, "Failed to register agent metric");
    }
    collector
}

impl AgentMetricsInner {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            scrape_latency_seconds: register(Histogram::with_opts(
                HistogramOpts::new(
                    "vmi_agent_scrape_latency_seconds",
                    "Time spent deriving VMI stats for one scrape",
                )
                .buckets(LATENCY_BUCKETS.to_vec()),
            )?),
            vmis_reported: register(IntGauge::with_opts(Opts::new(
                "vmi_agent_vmis_reported",
                "Number of VMIs in the last derived scrape",
            ))?),
            snapshot_reload_errors: register(IntCounter::with_opts(Opts::new(
                "vmi_agent_snapshot_reload_errors_total",
                "Total number of failed snapshot reloads",
            ))?),
            snapshot_last_success_timestamp: register(IntGauge::with_opts(Opts::new(
                "vmi_agent_snapshot_last_success_timestamp_seconds",
                "Unix time of the last successful snapshot load",
            ))?),
            link_discovery_attempts: register(IntCounter::with_opts(Opts::new(
                "vmi_agent_link_discovery_attempts_total",
                "Total number of link discovery requests",
            ))?),
            link_discovery_failures: register(IntCounter::with_opts(Opts::new(
                "vmi_agent_link_discovery_failures_total",
                "Total number of link discovery requests that found no link",
            ))?),
        })
    }
}

/// Agent metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying series.
#[derive(Clone)]
pub struct AgentMetrics {
    inner: Option<&'static AgentMetricsInner>,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (registers global metrics on first call)
    pub fn new() -> Self {
        let inner = GLOBAL_METRICS.get_or_init(|| match AgentMetricsInner::new() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Agent metrics disabled");
                None
            }
        });
        Self {
            inner: inner.as_ref(),
        }
    }

    fn with(&self, f: impl FnOnce(&AgentMetricsInner)) {
        if let Some(inner) = self.inner {
            f(inner);
        }
    }

    pub fn observe_scrape_latency(&self, duration_secs: f64) {
        self.with(|m| m.scrape_latency_seconds.observe(duration_secs));
    }

    pub fn set_vmis_reported(&self, count: i64) {
        self.with(|m| m.vmis_reported.set(count));
    }

    pub fn inc_snapshot_reload_errors(&self) {
        self.with(|m| m.snapshot_reload_errors.inc());
    }

    pub fn snapshot_reload_errors(&self) -> u64 {
        self.inner.map_or(0, |m| m.snapshot_reload_errors.get())
    }

    pub fn set_snapshot_loaded_at(&self, unix_secs: i64) {
        self.with(|m| m.snapshot_last_success_timestamp.set(unix_secs));
    }

    pub fn inc_link_discovery_attempts(&self) {
        self.with(|m| m.link_discovery_attempts.inc());
    }

    pub fn inc_link_discovery_failures(&self) {
        self.with(|m| m.link_discovery_failures.inc());
    }
}

/// Structured logger for agent events
///
/// Every record carries an `event` field and the node name so log
/// pipelines can filter without parsing messages.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, snapshot_path: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            snapshot_path = %snapshot_path,
            "VMI agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "VMI agent shutting down"
        );
    }

    pub fn log_snapshot_loaded(&self, vmis: usize, skipped_vmis: usize) {
        if skipped_vmis > 0 {
            warn!(
                event = "snapshot_loaded",
                node = %self.node_name,
                vmis = vmis,
                skipped_vmis = skipped_vmis,
                "Loaded cluster snapshot, some VMIs were malformed"
            );
        } else {
            info!(
                event = "snapshot_loaded",
                node = %self.node_name,
                vmis = vmis,
                "Loaded cluster snapshot"
            );
        }
    }

    pub fn log_snapshot_reload_failed(&self, error: &str, keeping_previous: bool) {
        warn!(
            event = "snapshot_reload_failed",
            node = %self.node_name,
            error = %error,
            keeping_previous = keeping_previous,
            "Snapshot reload failed"
        );
    }

    pub fn log_link_discovered(&self, namespace: &str, vmi: &str, network: &str, link: &str) {
        info!(
            event = "link_discovered",
            node = %self.node_name,
            namespace = %namespace,
            vmi = %vmi,
            network = %network,
            link = %link,
            "Resolved pod link for network"
        );
    }

    pub fn log_link_discovery_failed(&self, namespace: &str, vmi: &str, network: &str, error: &str) {
        warn!(
            event = "link_discovery_failed",
            node = %self.node_name,
            namespace = %namespace,
            vmi = %vmi,
            network = %network,
            error = %error,
            "Pod link discovery failed"
        );
    }
}
