//! Agent library for VMI network observability
//!
//! This crate provides the core functionality for:
//! - Resolving the pod-side network link behind a VMI network
//! - Deriving VMI info, address, migration and vNIC stats
//! - Loading and reloading the cluster snapshot those stats are derived from
//! - Prometheus exposition, health checks and structured logging

pub mod exporter;
pub mod health;
pub mod link;
pub mod models;
pub mod observability;
pub mod snapshot;
pub mod stats;

pub use exporter::VmiStatsCollector;
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use link::{discover_by_network, DiscoveryError, Link, NetworkHandler, SysfsNetworkHandler};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use snapshot::{ClusterSnapshot, SnapshotError, SnapshotStore};
pub use stats::{report_vmis_stats, CollectorResult, StatSample, StatsConfig};
