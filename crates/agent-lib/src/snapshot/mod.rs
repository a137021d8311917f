//! Cluster state snapshot
//!
//! The agent does not talk to the API server itself. A sidecar (or a
//! mounted ConfigMap) writes a JSON document with the VMIs of interest and
//! the objects the stats need to resolve: virt-launcher pods, migrations,
//! instance types and preferences. This module loads that document, keeps
//! the current copy behind an atomically swapped `Arc`, and reloads it
//! periodically or when the file changes.

mod reload;
mod watcher;

#[cfg(test)]
mod tests;

pub use reload::{ReloadConfig, ReloadLoop, ReloadLoopBuilder};
pub use watcher::{SnapshotWatcher, WatcherHandle};

use crate::models::{Pod, VendorObject, VirtualMachineInstance, VirtualMachineInstanceMigration};
use crate::stats::ClusterStores;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no snapshot source configured")]
    NoSource,
}

/// Cluster objects consumed by link discovery and stats derivation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSnapshot {
    pub vmis: Vec<VirtualMachineInstance>,
    pub pods: Vec<Pod>,
    pub migrations: Vec<VirtualMachineInstanceMigration>,
    pub instancetypes: Vec<VendorObject>,
    pub cluster_instancetypes: Vec<VendorObject>,
    pub preferences: Vec<VendorObject>,
    pub cluster_preferences: Vec<VendorObject>,
}

/// Document as read from disk; VMIs stay untyped until parsed one by one
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSnapshot {
    vmis: Vec<serde_json::Value>,
    pods: Vec<Pod>,
    migrations: Vec<VirtualMachineInstanceMigration>,
    instancetypes: Vec<VendorObject>,
    cluster_instancetypes: Vec<VendorObject>,
    preferences: Vec<VendorObject>,
    cluster_preferences: Vec<VendorObject>,
}

/// Parse result with the number of VMI entries that had to be dropped
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSnapshot {
    pub snapshot: ClusterSnapshot,
    pub skipped_vmis: usize,
}

impl ClusterSnapshot {
    /// Parse a snapshot document.
    ///
    /// A VMI entry that does not deserialize is skipped with a warning; the
    /// rest of the document must be well formed.
    pub fn from_json(raw: &str) -> Result<ParsedSnapshot, SnapshotError> {
        let raw: RawSnapshot = serde_json::from_str(raw)?;
        let mut skipped_vmis = 0;

        let vmis = raw
            .vmis
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| {
                match serde_json::from_value::<VirtualMachineInstance>(value) {
                    Ok(vmi) => Some(vmi),
                    Err(e) => {
                        skipped_vmis += 1;
                        warn!(index = index, error = %e, "Skipping malformed VMI in snapshot");
                        None
                    }
                }
            })
            .collect();

        Ok(ParsedSnapshot {
            snapshot: ClusterSnapshot {
                vmis,
                pods: raw.pods,
                migrations: raw.migrations,
                instancetypes: raw.instancetypes,
                cluster_instancetypes: raw.cluster_instancetypes,
                preferences: raw.preferences,
                cluster_preferences: raw.cluster_preferences,
            },
            skipped_vmis,
        })
    }

    pub async fn from_file(path: &Path) -> Result<ParsedSnapshot, SnapshotError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&raw)
    }

    pub fn find_vmi(&self, namespace: &str, name: &str) -> Option<&VirtualMachineInstance> {
        self.vmis
            .iter()
            .find(|vmi| vmi.metadata.namespace == namespace && vmi.metadata.name == name)
    }
}

/// A snapshot with its derived lookup stores
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub snapshot: ClusterSnapshot,
    pub stores: ClusterStores,
    pub skipped_vmis: usize,
    /// `None` until a document was actually loaded
    pub loaded_at: Option<DateTime<Utc>>,
}

impl LoadedSnapshot {
    pub fn empty() -> Self {
        Self::from_snapshot(ClusterSnapshot::default(), 0, None)
    }

    fn from_snapshot(
        snapshot: ClusterSnapshot,
        skipped_vmis: usize,
        loaded_at: Option<DateTime<Utc>>,
    ) -> Self {
        let stores = ClusterStores::from_snapshot(&snapshot);
        Self {
            snapshot,
            stores,
            skipped_vmis,
            loaded_at,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }
}

/// Shared holder of the current snapshot.
///
/// Readers clone the inner `Arc` and never block a reload for longer than
/// the pointer swap.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    current: Arc<RwLock<Arc<LoadedSnapshot>>>,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    /// Store backed by a snapshot file; empty until the first reload
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(LoadedSnapshot::empty()))),
            path: Some(path.into()),
        }
    }

    /// Store holding a fixed in-memory snapshot
    pub fn from_snapshot(snapshot: ClusterSnapshot) -> Self {
        let store = Self {
            current: Arc::new(RwLock::new(Arc::new(LoadedSnapshot::empty()))),
            path: None,
        };
        store.replace(snapshot, 0);
        store
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current(&self) -> Arc<LoadedSnapshot> {
        // A poisoned lock still holds a complete Arc
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a new snapshot
    pub fn replace(&self, snapshot: ClusterSnapshot, skipped_vmis: usize) -> Arc<LoadedSnapshot> {
        let loaded = Arc::new(LoadedSnapshot::from_snapshot(
            snapshot,
            skipped_vmis,
            Some(Utc::now()),
        ));
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = loaded.clone();
        loaded
    }

    /// Re-read the backing file. On error the current snapshot is kept.
    pub async fn reload(&self) -> Result<Arc<LoadedSnapshot>, SnapshotError> {
        let path = self.path.as_deref().ok_or(SnapshotError::NoSource)?;
        let parsed = ClusterSnapshot::from_file(path).await?;

        debug!(
            path = %path.display(),
            vmis = parsed.snapshot.vmis.len(),
            "Snapshot parsed"
        );

        Ok(self.replace(parsed.snapshot, parsed.skipped_vmis))
    }
}
