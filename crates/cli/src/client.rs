//! API client for the VMI agent HTTP API

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;
use vmi_agent_lib::{Link, StatSample};

/// Non-success response from the agent
#[derive(Debug, Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub attempted: Vec<String>,
}

/// API client for the agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    async fn send(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = self.base_url.join(path).context("Invalid path")?;

        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .context("Failed to send request")
    }

    /// GET a JSON resource; any non-success status is an [`ApiError`]
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self.send(path, query).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, attempted) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(error) => (error.error, error.attempted),
                Err(_) => (body, Vec::new()),
            };
            return Err(ApiError {
                status,
                message,
                attempted,
            }
            .into());
        }

        response.json().await.context("Failed to parse response")
    }

    /// GET a JSON resource whose body is meaningful for any status (health probes)
    pub async fn get_with_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let response = self.send(path, &[]).await?;
        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    pub async fn stats(&self, family: Option<&str>, namespace: Option<&str>) -> Result<Vec<StatSample>> {
        let mut query = Vec::new();
        if let Some(family) = family {
            query.push(("family", family));
        }
        if let Some(namespace) = namespace {
            query.push(("namespace", namespace));
        }
        self.get("api/v1/stats", &query).await
    }

    pub async fn link(&self, namespace: &str, vmi: &str, network: &str) -> Result<LinkResponse> {
        let path = format!(
            "api/v1/namespaces/{}/vmis/{}/links/{}",
            namespace, vmi, network
        );
        self.get(&path, &[]).await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResponse {
    pub namespace: String,
    pub vmi: String,
    pub network: String,
    pub link: Link,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub attempted: Vec<String>,
}
