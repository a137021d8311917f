//! `kubevirt_vmi_status_addresses` derivation

use super::{CollectorResult, VMI_STATUS_ADDRESSES};
use crate::models::{VirtualMachineInstance, VmiNetworkInterface};

const EXTERNAL_INTERFACE: &str = "ExternalInterface";
const SYSTEM_INTERFACE: &str = "SystemInterface";

/// Interfaces without a network name are guest-internal (bridges, OVS ports)
fn interface_type(iface: &VmiNetworkInterface) -> &'static str {
    if iface.name.is_empty() {
        SYSTEM_INTERFACE
    } else {
        EXTERNAL_INTERFACE
    }
}

/// One sample per reported interface that carries any observation
pub fn collect_vmi_interfaces(vmi: &VirtualMachineInstance) -> Vec<CollectorResult> {
    vmi.status
        .interfaces
        .iter()
        .filter(|iface| {
            !(iface.name.is_empty() && iface.interface_name.is_empty() && iface.ip.is_empty())
        })
        .map(|iface| {
            CollectorResult::new(
                &VMI_STATUS_ADDRESSES,
                vec![
                    vmi.status.node_name.clone(),
                    vmi.metadata.namespace.clone(),
                    vmi.metadata.name.clone(),
                    iface.name.clone(),
                    iface.interface_name.clone(),
                    iface.ip.clone(),
                    interface_type(iface).to_string(),
                ],
                1.0,
            )
        })
        .collect()
}
