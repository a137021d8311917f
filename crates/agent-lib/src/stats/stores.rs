//! Read-only indexes over a cluster snapshot

use crate::models::{Pod, VendorObject, VirtualMachineInstanceMigration};
use crate::snapshot::ClusterSnapshot;
use std::collections::HashMap;

/// Indexed lookups used during derivation
///
/// Namespaced objects are keyed by `namespace/name`, cluster-scoped ones by
/// `name`, pods by namespace and migrations by UID.
#[derive(Debug, Default, Clone)]
pub struct ClusterStores {
    instancetypes: HashMap<String, VendorObject>,
    cluster_instancetypes: HashMap<String, VendorObject>,
    preferences: HashMap<String, VendorObject>,
    cluster_preferences: HashMap<String, VendorObject>,
    pods_by_namespace: HashMap<String, Vec<Pod>>,
    migrations_by_uid: HashMap<String, VirtualMachineInstanceMigration>,
}

/// Store key of a namespaced object
pub fn namespaced_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

fn index_namespaced(objects: &[VendorObject]) -> HashMap<String, VendorObject> {
    objects
        .iter()
        .map(|o| {
            (
                namespaced_key(&o.metadata.namespace, &o.metadata.name),
                o.clone(),
            )
        })
        .collect()
}

fn index_cluster(objects: &[VendorObject]) -> HashMap<String, VendorObject> {
    objects
        .iter()
        .map(|o| (o.metadata.name.clone(), o.clone()))
        .collect()
}

impl ClusterStores {
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        let mut pods_by_namespace: HashMap<String, Vec<Pod>> = HashMap::new();
        for pod in &snapshot.pods {
            pods_by_namespace
                .entry(pod.metadata.namespace.clone())
                .or_default()
                .push(pod.clone());
        }

        let migrations_by_uid = snapshot
            .migrations
            .iter()
            .filter(|m| !m.metadata.uid.is_empty())
            .map(|m| (m.metadata.uid.clone(), m.clone()))
            .collect();

        Self {
            instancetypes: index_namespaced(&snapshot.instancetypes),
            cluster_instancetypes: index_cluster(&snapshot.cluster_instancetypes),
            preferences: index_namespaced(&snapshot.preferences),
            cluster_preferences: index_cluster(&snapshot.cluster_preferences),
            pods_by_namespace,
            migrations_by_uid,
        }
    }

    pub fn instancetype(&self, namespace: &str, name: &str) -> Option<&VendorObject> {
        self.instancetypes.get(&namespaced_key(namespace, name))
    }

    pub fn cluster_instancetype(&self, name: &str) -> Option<&VendorObject> {
        self.cluster_instancetypes.get(name)
    }

    pub fn preference(&self, namespace: &str, name: &str) -> Option<&VendorObject> {
        self.preferences.get(&namespaced_key(namespace, name))
    }

    pub fn cluster_preference(&self, name: &str) -> Option<&VendorObject> {
        self.cluster_preferences.get(name)
    }

    /// Pods in a namespace, in snapshot order
    pub fn pods_in_namespace(&self, namespace: &str) -> &[Pod] {
        self.pods_by_namespace
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn migration_by_uid(&self, uid: &str) -> Option<&VirtualMachineInstanceMigration> {
        self.migrations_by_uid.get(uid)
    }
}
