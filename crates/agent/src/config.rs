//! Agent configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use vmi_agent_lib::{link::DEFAULT_SYSFS_NET_ROOT, EvictionStrategy, StatsConfig};

/// Agent configuration, read from `AGENT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics/stats
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Cluster snapshot document written by the sidecar
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// Periodic snapshot reload interval in seconds
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,

    /// Watch the snapshot file and reload on change
    #[serde(default = "default_watch_snapshot")]
    pub watch_snapshot: bool,

    /// sysfs net directory of the namespace links are discovered in
    #[serde(default = "default_sysfs_net_root")]
    pub sysfs_net_root: String,

    /// Cluster-wide eviction strategy for VMIs that set none
    #[serde(default)]
    pub default_eviction_strategy: Option<EvictionStrategy>,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_snapshot_path() -> String {
    "/var/run/vmi-agent/snapshot.json".to_string()
}

fn default_reload_interval() -> u64 {
    30
}

fn default_watch_snapshot() -> bool {
    true
}

fn default_sysfs_net_root() -> String {
    DEFAULT_SYSFS_NET_ROOT.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            snapshot_path: default_snapshot_path(),
            reload_interval_secs: default_reload_interval(),
            watch_snapshot: default_watch_snapshot(),
            sysfs_net_root: default_sysfs_net_root(),
            default_eviction_strategy: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("AGENT"))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
            .context("Invalid agent configuration")
    }

    pub fn stats_config(&self) -> StatsConfig {
        StatsConfig {
            default_eviction_strategy: self.default_eviction_strategy,
        }
    }
}
