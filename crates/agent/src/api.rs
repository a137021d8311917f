//! HTTP API: health probes, Prometheus metrics, derived stats and link lookups

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use vmi_agent_lib::{
    discover_by_network,
    health::{ComponentStatus, HealthRegistry},
    link::{Link, NetworkHandler},
    observability::{AgentMetrics, StructuredLogger},
    snapshot::SnapshotStore,
    stats::{family_by_name, report_vmis_stats, StatSample, StatsConfig},
    DiscoveryError, Network,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AgentMetrics,
    pub logger: StructuredLogger,
    pub store: SnapshotStore,
    pub handler: Arc<dyn NetworkHandler>,
    pub stats_config: StatsConfig,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: AgentMetrics,
        logger: StructuredLogger,
        store: SnapshotStore,
        handler: Arc<dyn NetworkHandler>,
        stats_config: StatsConfig,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            logger,
            store,
            handler,
            stats_config,
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempted: Vec<String>,
}

fn error_response(status: StatusCode, error: impl Into<String>, attempted: Vec<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            attempted,
        }),
    )
        .into_response()
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub family: Option<String>,
    pub namespace: Option<String>,
}

/// Derived stats for the current snapshot as JSON samples
async fn stats(State(state): State<Arc<AppState>>, Query(query): Query<StatsQuery>) -> Response {
    let family = match query.family.as_deref() {
        Some(name) => match family_by_name(name) {
            Some(family) => Some(family),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("unknown metric family {:?}", name),
                    Vec::new(),
                )
            }
        },
        None => None,
    };

    let loaded = state.store.current();
    let vmis: Vec<_> = loaded
        .snapshot
        .vmis
        .iter()
        .filter(|vmi| {
            query
                .namespace
                .as_deref()
                .map_or(true, |ns| vmi.metadata.namespace == ns)
        })
        .cloned()
        .collect();

    let samples: Vec<StatSample> = report_vmis_stats(&vmis, &loaded.stores, &state.stats_config)
        .iter()
        .filter(|r| family.map_or(true, |f| r.family.name == f.name))
        .map(|r| r.to_sample())
        .collect();

    Json(samples).into_response()
}

/// Response of a successful link lookup
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkResponse {
    pub namespace: String,
    pub vmi: String,
    pub network: String,
    pub link: Link,
}

/// Resolve the pod link backing one network of a VMI
async fn vmi_link(
    State(state): State<Arc<AppState>>,
    Path((namespace, name, network)): Path<(String, String, String)>,
) -> Response {
    let loaded = state.store.current();
    let Some(vmi) = loaded.snapshot.find_vmi(&namespace, &name) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("VMI {}/{} not found", namespace, name),
            Vec::new(),
        );
    };

    state.metrics.inc_link_discovery_attempts();

    let target = Network {
        name: network.clone(),
        ..Default::default()
    };
    let result = discover_by_network(
        state.handler.as_ref(),
        &vmi.spec.networks,
        &target,
        &vmi.status.interfaces,
    )
    .await;

    match result {
        Ok(link) => {
            state
                .logger
                .log_link_discovered(&namespace, &name, &network, &link.name);
            Json(LinkResponse {
                namespace,
                vmi: name,
                network,
                link,
            })
            .into_response()
        }
        Err(e) => {
            state.metrics.inc_link_discovery_failures();
            state
                .logger
                .log_link_discovery_failed(&namespace, &name, &network, &e.to_string());

            match e {
                DiscoveryError::NetworkNotDeclared { .. } => {
                    error_response(StatusCode::BAD_REQUEST, e.to_string(), Vec::new())
                }
                DiscoveryError::LinkNotFound { ref attempted, .. } => {
                    let attempted = attempted.clone();
                    error_response(StatusCode::NOT_FOUND, e.to_string(), attempted)
                }
            }
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/stats", get(stats))
        .route(
            "/api/v1/namespaces/:namespace/vmis/:name/links/:network",
            get(vmi_link),
        )
        .with_state(state)
}

/// Serve on an already bound listener
pub async fn serve_on(listener: tokio::net::TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(listener, state).await
}
