//! Link commands: ask the agent, or resolve locally against sysfs

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use vmi_agent_lib::{
    discover_by_network, DiscoveryError, Link, Network, SysfsNetworkHandler,
    VirtualMachineInstance,
};

use crate::client::{ApiClient, ApiError};
use crate::output::{color_status, print_error, print_json, print_success, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// serde name of a unit enum value, e.g. `lowerlayerdown`
fn serde_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn print_link(network: &str, link: &Link, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(link);
        return;
    }

    print_success(&format!("Network {} is backed by {}", network, link.name));
    let rows = vec![
        FieldRow {
            field: "Name",
            value: link.name.clone(),
        },
        FieldRow {
            field: "Index",
            value: link.index.to_string(),
        },
        FieldRow {
            field: "MTU",
            value: link.mtu.to_string(),
        },
        FieldRow {
            field: "MAC",
            value: link.mac.clone().unwrap_or_else(|| "-".to_string()),
        },
        FieldRow {
            field: "State",
            value: color_status(&serde_name(&link.oper_state)),
        },
        FieldRow {
            field: "Kind",
            value: serde_name(&link.kind),
        },
    ];
    print_table(&rows, format);
}

fn print_attempted(attempted: &[String]) {
    if !attempted.is_empty() {
        print_error(&format!("Tried: {}", attempted.join(", ")));
    }
}

/// Resolve a VMI network link through the agent
pub async fn show_link(
    client: &ApiClient,
    namespace: &str,
    vmi: &str,
    network: &str,
    format: OutputFormat,
) -> Result<()> {
    match client.link(namespace, vmi, network).await {
        Ok(response) => {
            print_link(&response.network, &response.link, format);
            Ok(())
        }
        Err(e) => {
            if let Some(api_error) = e.downcast_ref::<ApiError>() {
                print_attempted(&api_error.attempted);
            }
            Err(e)
        }
    }
}

/// Resolve a network link for a VMI manifest against a local sysfs tree
pub async fn discover(
    vmi_path: &Path,
    network: &str,
    sysfs_root: &Path,
    format: OutputFormat,
) -> Result<()> {
    let content = tokio::fs::read_to_string(vmi_path)
        .await
        .with_context(|| format!("Failed to read {}", vmi_path.display()))?;
    let vmi: VirtualMachineInstance =
        serde_json::from_str(&content).context("Failed to parse VMI")?;

    let handler = SysfsNetworkHandler::new(sysfs_root);
    let target = Network {
        name: network.to_string(),
        ..Default::default()
    };

    match discover_by_network(&handler, &vmi.spec.networks, &target, &vmi.status.interfaces).await
    {
        Ok(link) => {
            print_link(network, &link, format);
            Ok(())
        }
        Err(e) => {
            if let DiscoveryError::LinkNotFound { attempted, .. } = &e {
                print_attempted(attempted);
            }
            Err(e.into())
        }
    }
}
