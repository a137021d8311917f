//! Pod interface naming schemes
//!
//! A secondary network is plugged into the pod under a name derived from a
//! hash of its logical name. Older launchers used ordinal names (`net1`,
//! `net2`, ...) instead, so discovery falls back to those.

use crate::models::{Network, VmiNetworkInterface};
use sha2::{Digest, Sha256};

/// Name of the pod interface backing the primary network
pub const PRIMARY_POD_INTERFACE_NAME: &str = "eth0";

const HASHED_NAME_PREFIX: &str = "pod";
const HASHED_NAME_LEN: usize = 11;
const ORDINAL_NAME_PREFIX: &str = "net";

/// Hash-based pod interface name, e.g. `blue` -> `pod16477688c0e`
pub fn hashed_pod_interface_name(network: &Network) -> String {
    let digest = hex::encode(Sha256::digest(network.name.as_bytes()));
    format!("{}{}", HASHED_NAME_PREFIX, &digest[..HASHED_NAME_LEN])
}

/// Ordinal pod interface name of a secondary network
///
/// Secondary networks are numbered from 1 in declaration order; primary
/// networks are skipped. Returns `None` if `network_name` is not a declared
/// secondary network.
pub fn ordinal_pod_interface_name(network_name: &str, networks: &[Network]) -> Option<String> {
    networks
        .iter()
        .filter(|n| n.is_secondary())
        .position(|n| n.name == network_name)
        .map(|i| format!("{}{}", ORDINAL_NAME_PREFIX, i + 1))
}

/// Pod interface name recorded in the VMI status for a network, if any
pub fn pod_interface_name_override<'a>(
    network_name: &str,
    statuses: &'a [VmiNetworkInterface],
) -> Option<&'a str> {
    statuses
        .iter()
        .find(|s| s.name == network_name && !s.pod_interface_name.is_empty())
        .map(|s| s.pod_interface_name.as_str())
}
