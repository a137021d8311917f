//! Core data models for VirtualMachineInstances and the cluster objects
//! the agent reads alongside them.
//!
//! The serde shapes follow the KubeVirt JSON wire format (camelCase), so a
//! snapshot dumped from the API server deserializes without translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the network KubeVirt attaches to every VMI by default
pub const DEFAULT_NETWORK_NAME: &str = "default";

/// Subset of Kubernetes object metadata used by the agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Pod network source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_network_cidr: Option<String>,
}

/// Multus network source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultusNetwork {
    pub network_name: String,
    /// Multus network replacing the pod network as the primary one
    pub default: bool,
}

/// A logical network declared on a VMI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodNetwork>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multus: Option<MultusNetwork>,
}

impl Network {
    /// The default pod network every VMI gets
    pub fn default_pod() -> Self {
        Self {
            name: DEFAULT_NETWORK_NAME.to_string(),
            pod: Some(PodNetwork::default()),
            multus: None,
        }
    }

    /// A secondary network provided by multus
    pub fn multus(name: impl Into<String>, network_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pod: None,
            multus: Some(MultusNetwork {
                network_name: network_name.into(),
                default: false,
            }),
        }
    }

    /// Returns true for the network backing the pod's primary interface
    pub fn is_primary(&self) -> bool {
        self.pod.is_some() || self.multus.as_ref().map(|m| m.default).unwrap_or(false)
    }

    /// Returns true for additional (non-default) multus networks
    pub fn is_secondary(&self) -> bool {
        self.multus.as_ref().map(|m| !m.default).unwrap_or(false)
    }
}

/// Core binding methods that connect a guest NIC to its pod network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreBinding {
    Bridge,
    Slirp,
    Masquerade,
    Sriov,
    Macvtap,
    Passt,
}

impl CoreBinding {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoreBinding::Bridge => "bridge",
            CoreBinding::Slirp => "slirp",
            CoreBinding::Masquerade => "masquerade",
            CoreBinding::Sriov => "sriov",
            CoreBinding::Macvtap => "macvtap",
            CoreBinding::Passt => "passt",
        }
    }
}

/// Empty marker object, e.g. `"bridge": {}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingMarker {}

/// Wire form of the core binding method, at most one field set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceBindingMethod {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BindingMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slirp: Option<BindingMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<BindingMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sriov: Option<BindingMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macvtap: Option<BindingMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passt: Option<BindingMarker>,
}

impl InterfaceBindingMethod {
    pub fn from_core(binding: CoreBinding) -> Self {
        let marker = Some(BindingMarker::default());
        let mut method = Self::default();
        match binding {
            CoreBinding::Bridge => method.bridge = marker,
            CoreBinding::Slirp => method.slirp = marker,
            CoreBinding::Masquerade => method.masquerade = marker,
            CoreBinding::Sriov => method.sriov = marker,
            CoreBinding::Macvtap => method.macvtap = marker,
            CoreBinding::Passt => method.passt = marker,
        }
        method
    }

    pub fn kind(&self) -> Option<CoreBinding> {
        if self.bridge.is_some() {
            Some(CoreBinding::Bridge)
        } else if self.slirp.is_some() {
            Some(CoreBinding::Slirp)
        } else if self.masquerade.is_some() {
            Some(CoreBinding::Masquerade)
        } else if self.sriov.is_some() {
            Some(CoreBinding::Sriov)
        } else if self.macvtap.is_some() {
            Some(CoreBinding::Macvtap)
        } else if self.passt.is_some() {
            Some(CoreBinding::Passt)
        } else {
            None
        }
    }
}

/// Network binding plugin reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginBinding {
    pub name: String,
}

/// Guest NIC declared in the VMI domain spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Interface {
    pub name: String,
    #[serde(flatten)]
    pub binding_method: InterfaceBindingMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<PluginBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pci_address: Option<String>,
}

impl Interface {
    pub fn core(name: impl Into<String>, binding: CoreBinding) -> Self {
        Self {
            name: name.into(),
            binding_method: InterfaceBindingMethod::from_core(binding),
            ..Default::default()
        }
    }

    pub fn plugin(name: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: Some(PluginBinding {
                name: plugin.into(),
            }),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn core_binding(&self) -> Option<CoreBinding> {
        self.binding_method.kind()
    }
}

/// Interface state reported in the VMI status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmiNetworkInterface {
    /// Logical network name, empty for interfaces unknown to the VMI spec
    pub name: String,
    /// Interface name inside the guest
    pub interface_name: String,
    #[serde(rename = "ipAddress")]
    pub ip: String,
    #[serde(rename = "ipAddresses")]
    pub ips: Vec<String>,
    pub mac: String,
    pub info_source: String,
    /// Name of the pod interface backing this network, when known
    pub pod_interface_name: String,
}

/// Live migration bookkeeping carried on the VMI status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MigrationState {
    pub migration_uid: String,
    pub target_pod: String,
    pub source_pod: String,
    pub target_node: String,
    pub source_node: String,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub completed: bool,
    pub failed: bool,
}

/// Guest OS details reported by the guest agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuestOsInfo {
    pub name: String,
    pub id: String,
    pub kernel_release: String,
    pub kernel_version: String,
    pub machine: String,
    pub pretty_name: String,
    pub version: String,
    pub version_id: String,
}

/// Emulated machine of the domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Machine {
    #[serde(rename = "type")]
    pub machine_type: String,
}

/// VMI condition types the agent inspects
pub mod conditions {
    pub const LIVE_MIGRATABLE: &str = "LiveMigratable";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmiCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    /// "True", "False" or "Unknown"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Eviction strategy of a VMI or the cluster default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionStrategy {
    None,
    LiveMigrate,
    LiveMigrateIfPossible,
    External,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Devices {
    pub interfaces: Vec<Interface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomainSpec {
    pub devices: Devices,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmiSpec {
    pub domain: DomainSpec,
    pub networks: Vec<Network>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eviction_strategy: Option<EvictionStrategy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmiStatus {
    pub phase: String,
    pub node_name: String,
    pub interfaces: Vec<VmiNetworkInterface>,
    pub migration_state: Option<MigrationState>,
    #[serde(rename = "guestOSInfo")]
    pub guest_os_info: GuestOsInfo,
    pub conditions: Vec<VmiCondition>,
    pub machine: Option<Machine>,
}

/// A running virtual machine's desired and observed state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualMachineInstance {
    pub metadata: ObjectMeta,
    pub spec: VmiSpec,
    pub status: VmiStatus,
}

impl VirtualMachineInstance {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Default::default()
        }
    }

    /// Looks up a declared network by exact name
    pub fn network(&self, name: &str) -> Option<&Network> {
        self.spec.networks.iter().find(|n| n.name == name)
    }

    /// Status of a condition type, if reported
    pub fn condition_status(&self, condition_type: &str) -> Option<&str> {
        self.status
            .conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
            .map(|c| c.status.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
    pub node_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodStatus {
    pub phase: String,
}

/// virt-launcher pod
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualMachineInstanceMigration {
    pub metadata: ObjectMeta,
}

/// Instance type or preference; only the vendor label matters here
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorObject {
    pub metadata: ObjectMeta,
}
