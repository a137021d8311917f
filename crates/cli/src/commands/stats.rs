//! Stats commands: query the agent, or derive locally from a snapshot file

use anyhow::{Context, Result};
use std::path::Path;
use vmi_agent_lib::{
    exporter::encode_text,
    report_vmis_stats,
    stats::family_by_name,
    ClusterSnapshot, StatSample, StatsConfig,
};

use crate::client::ApiClient;
use crate::output::{print_samples, print_warning, OutputFormat};

/// Show stats derived by the agent
pub async fn show_stats(
    client: &ApiClient,
    family: Option<&str>,
    namespace: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let samples = client.stats(family, namespace).await?;
    print_samples(&samples, format);
    Ok(())
}

/// Derive stats from a snapshot file without an agent
pub async fn derive(
    snapshot_path: &Path,
    family: Option<&str>,
    namespace: Option<&str>,
    text: bool,
    format: OutputFormat,
) -> Result<()> {
    if let Some(name) = family {
        if family_by_name(name).is_none() {
            anyhow::bail!("Unknown metric family {:?}", name);
        }
    }

    let parsed = ClusterSnapshot::from_file(snapshot_path)
        .await
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;
    if parsed.skipped_vmis > 0 {
        print_warning(&format!(
            "Skipped {} malformed VMI(s) in snapshot",
            parsed.skipped_vmis
        ));
    }

    let mut snapshot = parsed.snapshot;
    if let Some(ns) = namespace {
        snapshot.vmis.retain(|vmi| vmi.metadata.namespace == ns);
    }

    let stores = vmi_agent_lib::stats::ClusterStores::from_snapshot(&snapshot);
    let results: Vec<_> = report_vmis_stats(&snapshot.vmis, &stores, &StatsConfig::default())
        .into_iter()
        .filter(|r| family.map_or(true, |f| r.family.name == f))
        .collect();

    if text {
        print!("{}", encode_text(&results)?);
        return Ok(());
    }

    let samples: Vec<StatSample> = results.iter().map(|r| r.to_sample()).collect();
    print_samples(&samples, format);
    Ok(())
}
