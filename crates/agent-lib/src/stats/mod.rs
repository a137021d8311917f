//! VMI stats derivation
//!
//! Turns VMI snapshots plus read-only cluster stores into flat
//! label/value tuples, one [`CollectorResult`] per exported sample.
//! Every family has a fixed positional label schema; consumers match labels
//! by position, so the order in [`StatFamily::labels`] is part of the
//! contract.
//!
//! Derivation is best effort: missing or malformed fields omit a tuple or
//! fall back to a placeholder, they never abort the scrape.

mod eviction;
mod info;
mod interfaces;
mod migration;
mod stores;
mod vnic;

pub use eviction::{collect_eviction_blocker, is_non_evictable};
pub use info::{
    collect_vmi_info, resolve_vmi_pod, MigrationOutcome, INSTANCETYPE_VENDOR_LABEL,
    NONE_PLACEHOLDER, OTHER_PLACEHOLDER,
};
pub use interfaces::collect_vmi_interfaces;
pub use migration::collect_vmi_migration_time;
pub use stores::ClusterStores;
pub use vnic::collect_vmi_vnic_info;

use crate::models::{EvictionStrategy, VirtualMachineInstance};
use serde::{Deserialize, Serialize};

/// Descriptor of an exported metric family
#[derive(Debug, PartialEq, Eq)]
pub struct StatFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

pub static VMI_INFO: StatFamily = StatFamily {
    name: "kubevirt_vmi_info",
    help: "Information about VirtualMachineInstances.",
    labels: &[
        "node",
        "namespace",
        "name",
        "phase",
        "os",
        "workload",
        "flavor",
        "instance_type",
        "preference",
        "guest_os_kernel_release",
        "guest_os_machine",
        "guest_os_arch",
        "guest_os_name",
        "guest_os_version_id",
        "evictable",
        "outdated",
        "vmi_pod",
    ],
};

pub static VMI_NON_EVICTABLE: StatFamily = StatFamily {
    name: "kubevirt_vmi_non_evictable",
    help: "Indication for a VirtualMachine that its eviction strategy is set to Live Migration but is not migratable.",
    labels: &["node", "namespace", "name"],
};

pub static VMI_STATUS_ADDRESSES: StatFamily = StatFamily {
    name: "kubevirt_vmi_status_addresses",
    help: "The addresses of a VirtualMachineInstance. This metric provides the address of an available network interface associated with the VMI in the 'address' label, and about the type of address, such as internal IP, in the 'type' label.",
    labels: &[
        "node",
        "namespace",
        "name",
        "network_name",
        "interface_name",
        "address",
        "type",
    ],
};

pub static VMI_MIGRATION_START_TIME: StatFamily = StatFamily {
    name: "kubevirt_vmi_migration_start_time_seconds",
    help: "The time at which the migration started.",
    labels: &["node", "namespace", "name", "migration_name"],
};

pub static VMI_MIGRATION_END_TIME: StatFamily = StatFamily {
    name: "kubevirt_vmi_migration_end_time_seconds",
    help: "The time at which the migration ended.",
    labels: &["node", "namespace", "name", "migration_name", "status"],
};

pub static VMI_VNIC_INFO: StatFamily = StatFamily {
    name: "kubevirt_vmi_vnic_info",
    help: "Details of VirtualMachineInstance (VMI) vNIC interfaces, such as vNIC name, binding type, network name, and binding name for each vNIC of a running instance.",
    labels: &[
        "name",
        "namespace",
        "vnic_name",
        "binding_type",
        "network",
        "binding_name",
        "model",
    ],
};

/// All families, in the order they are reported per VMI
pub static ALL_FAMILIES: &[&StatFamily] = &[
    &VMI_INFO,
    &VMI_NON_EVICTABLE,
    &VMI_STATUS_ADDRESSES,
    &VMI_MIGRATION_START_TIME,
    &VMI_MIGRATION_END_TIME,
    &VMI_VNIC_INFO,
];

/// Look up a family by metric name
pub fn family_by_name(name: &str) -> Option<&'static StatFamily> {
    ALL_FAMILIES.iter().copied().find(|f| f.name == name)
}

/// One derived sample: positional label values plus a value
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorResult {
    pub family: &'static StatFamily,
    pub labels: Vec<String>,
    pub value: f64,
}

impl CollectorResult {
    pub fn new(family: &'static StatFamily, labels: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(family.labels.len(), labels.len(), "{}", family.name);
        Self {
            family,
            labels,
            value,
        }
    }

    /// Value of a label by name
    pub fn label(&self, name: &str) -> Option<&str> {
        self.family
            .labels
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    /// Serializable form for the JSON API
    pub fn to_sample(&self) -> StatSample {
        StatSample {
            metric: self.family.name.to_string(),
            label_names: self.family.labels.iter().map(|l| l.to_string()).collect(),
            labels: self.labels.clone(),
            value: self.value,
        }
    }
}

/// Wire form of a [`CollectorResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSample {
    pub metric: String,
    pub label_names: Vec<String>,
    pub labels: Vec<String>,
    pub value: f64,
}

/// Cluster-wide settings that influence derivation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsConfig {
    /// Eviction strategy applied to VMIs that do not set one
    pub default_eviction_strategy: Option<EvictionStrategy>,
}

/// Derive every sample for a set of VMIs.
///
/// Per VMI, in order: info, eviction blocker, status addresses, migration
/// times, vNIC info.
pub fn report_vmis_stats(
    vmis: &[VirtualMachineInstance],
    stores: &ClusterStores,
    config: &StatsConfig,
) -> Vec<CollectorResult> {
    let mut results = Vec::new();

    for vmi in vmis {
        results.push(collect_vmi_info(vmi, stores));
        results.push(collect_eviction_blocker(vmi, config));
        results.extend(collect_vmi_interfaces(vmi));
        results.extend(collect_vmi_migration_time(vmi, stores));
        results.extend(collect_vmi_vnic_info(vmi));
    }

    results
}
