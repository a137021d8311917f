//! `kubevirt_vmi_vnic_info` derivation

use super::{CollectorResult, NONE_PLACEHOLDER, VMI_VNIC_INFO};
use crate::models::{Interface, Network, VirtualMachineInstance};

const POD_NETWORKING: &str = "pod networking";

fn binding_labels(iface: &Interface) -> (&'static str, String) {
    match (&iface.binding, iface.core_binding()) {
        (Some(plugin), _) => ("plugin", plugin.name.clone()),
        (None, Some(core)) => ("core", core.as_str().to_string()),
        (None, None) => ("core", NONE_PLACEHOLDER.to_string()),
    }
}

fn network_label(network: &Network) -> String {
    match (&network.pod, &network.multus) {
        (Some(_), _) => POD_NETWORKING.to_string(),
        (None, Some(multus)) => multus.network_name.clone(),
        (None, None) => NONE_PLACEHOLDER.to_string(),
    }
}

/// One sample per spec interface paired with a declared network of the
/// same name; unpaired interfaces are dropped.
pub fn collect_vmi_vnic_info(vmi: &VirtualMachineInstance) -> Vec<CollectorResult> {
    vmi.spec
        .domain
        .devices
        .interfaces
        .iter()
        .filter_map(|iface| vmi.network(&iface.name).map(|network| (iface, network)))
        .map(|(iface, network)| {
            let (binding_type, binding_name) = binding_labels(iface);
            CollectorResult::new(
                &VMI_VNIC_INFO,
                vec![
                    vmi.metadata.name.clone(),
                    vmi.metadata.namespace.clone(),
                    iface.name.clone(),
                    binding_type.to_string(),
                    network_label(network),
                    binding_name,
                    iface
                        .model
                        .clone()
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| NONE_PLACEHOLDER.to_string()),
                ],
                1.0,
            )
        })
        .collect()
}
