//! Liveness and readiness state of the agent
//!
//! Liveness aggregates the status of each [`Component`]. Readiness is tied
//! to the snapshot: the agent only serves stats and link lookups once a
//! snapshot document has been loaded, and stays ready through later reload
//! failures because the previous snapshot keeps being served.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered from best to worst, so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Parts of the agent that report health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Snapshot file loading and reloading
    Snapshot,
    /// Prometheus collector registration
    Exporter,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Snapshot, Component::Exporter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Snapshot => "snapshot",
            Component::Exporter => "exporter",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: Utc::now().timestamp(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_loaded_at: Option<DateTime<Utc>>,
}

pub const SNAPSHOT_NOT_LOADED: &str = "Initial snapshot not loaded";

#[derive(Debug, Default)]
struct HealthState {
    components: BTreeMap<Component, ComponentHealth>,
    /// First successful load; never cleared by later failures
    snapshot_loaded_at: Option<DateTime<Utc>>,
}

/// Shared health state, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start reporting a component as healthy
    pub async fn register(&self, component: Component) {
        self.set(component, ComponentStatus::Healthy, None).await;
    }

    async fn set(&self, component: Component, status: ComponentStatus, message: Option<String>) {
        self.state
            .write()
            .await
            .components
            .insert(component, ComponentHealth::new(status, message));
    }

    pub async fn set_healthy(&self, component: Component) {
        self.set(component, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.set(component, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.set(component, ComponentStatus::Unhealthy, Some(message.into()))
            .await;
    }

    /// Record a successful snapshot load; makes the agent ready
    pub async fn snapshot_loaded(&self, at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.snapshot_loaded_at.get_or_insert(at);
        state.components.insert(
            Component::Snapshot,
            ComponentHealth::new(ComponentStatus::Healthy, None),
        );
    }

    /// Record a failed snapshot load.
    ///
    /// Degraded while an earlier snapshot is still served, unhealthy if none
    /// was ever loaded. Returns the status recorded.
    pub async fn snapshot_failed(&self, error: &str) -> ComponentStatus {
        let mut state = self.state.write().await;
        let (status, message) = if state.snapshot_loaded_at.is_some() {
            (
                ComponentStatus::Degraded,
                format!("serving previous snapshot: {}", error),
            )
        } else {
            (ComponentStatus::Unhealthy, error.to_string())
        };
        state
            .components
            .insert(Component::Snapshot, ComponentHealth::new(status, Some(message)));
        status
    }

    pub async fn snapshot_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.snapshot_loaded_at
    }

    pub async fn component(&self, component: Component) -> Option<ComponentHealth> {
        self.state.read().await.components.get(&component).cloned()
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);

        HealthResponse {
            status,
            components: state.components.clone(),
        }
    }

    /// Ready once a snapshot was loaded and no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let snapshot_loaded_at = state.snapshot_loaded_at;

        let reason = if snapshot_loaded_at.is_none() {
            Some(SNAPSHOT_NOT_LOADED.to_string())
        } else {
            state
                .components
                .iter()
                .find(|(_, health)| health.status == ComponentStatus::Unhealthy)
                .map(|(component, health)| match &health.message {
                    Some(message) => format!("{} unhealthy: {}", component.as_str(), message),
                    None => format!("{} unhealthy", component.as_str()),
                })
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            snapshot_loaded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overall_status_is_worst_component() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        for component in Component::ALL {
            registry.register(component).await;
        }
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        registry.set_degraded(Component::Exporter, "slow scrape").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.set_unhealthy(Component::Snapshot, "unreadable").await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(health.components.len(), 2);
    }

    #[tokio::test]
    async fn test_health_wire_format() {
        let registry = HealthRegistry::new();
        registry.set_degraded(Component::Snapshot, "stale").await;

        let json = serde_json::to_value(registry.health().await).unwrap();

        assert_eq!(json["status"], "degraded");
        assert_eq!(json["components"]["snapshot"]["status"], "degraded");
        assert_eq!(json["components"]["snapshot"]["message"], "stale");
    }

    #[tokio::test]
    async fn test_not_ready_until_snapshot_loaded() {
        let registry = HealthRegistry::new();
        registry.register(Component::Snapshot).await;
        registry.register(Component::Exporter).await;

        // All components healthy is not enough
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some(SNAPSHOT_NOT_LOADED));

        let at = Utc::now();
        registry.snapshot_loaded(at).await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert_eq!(readiness.snapshot_loaded_at, Some(at));
    }

    #[tokio::test]
    async fn test_snapshot_failure_before_and_after_first_load() {
        let registry = HealthRegistry::new();

        assert_eq!(
            registry.snapshot_failed("missing file").await,
            ComponentStatus::Unhealthy
        );
        assert!(!registry.readiness().await.ready);

        registry.snapshot_loaded(Utc::now()).await;
        assert_eq!(
            registry.snapshot_failed("truncated").await,
            ComponentStatus::Degraded
        );

        let snapshot = registry.component(Component::Snapshot).await.unwrap();
        assert_eq!(
            snapshot.message.as_deref(),
            Some("serving previous snapshot: truncated")
        );
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_unhealthy_component_blocks_readiness() {
        let registry = HealthRegistry::new();
        registry.snapshot_loaded(Utc::now()).await;
        registry
            .set_unhealthy(Component::Exporter, "duplicate registration")
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("exporter unhealthy: duplicate registration")
        );
    }

    #[tokio::test]
    async fn test_first_load_time_is_kept() {
        let registry = HealthRegistry::new();
        let first = Utc::now();
        registry.snapshot_loaded(first).await;
        registry
            .snapshot_loaded(first + chrono::Duration::seconds(30))
            .await;

        assert_eq!(registry.snapshot_loaded_at().await, Some(first));
    }
}
