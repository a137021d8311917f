//! Network to pod link resolution

use super::namescheme::{
    hashed_pod_interface_name, ordinal_pod_interface_name, pod_interface_name_override,
    PRIMARY_POD_INTERFACE_NAME,
};
use super::{Link, NetworkHandler};
use crate::models::{Network, VmiNetworkInterface};
use tracing::debug;

/// Link discovery failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// The network was never declared on the VMI
    #[error("network {network:?} is not declared in the VMI network list")]
    NetworkNotDeclared { network: String },

    /// None of the candidate interface names resolved to a link
    #[error("no link found for network {network:?} (tried {})", .attempted.join(", "))]
    LinkNotFound {
        network: String,
        attempted: Vec<String>,
    },
}

impl DiscoveryError {
    /// True for configuration errors, false for host-state errors
    pub fn is_declaration_error(&self) -> bool {
        matches!(self, DiscoveryError::NetworkNotDeclared { .. })
    }
}

/// Resolve the pod link backing `target`.
///
/// Candidate names, in order:
/// 1. the pod interface name recorded in `overrides` for the network (only one
///    attempt, no fallback),
/// 2. `eth0` for the primary network (only one attempt),
/// 3. the hashed name for a secondary network, then its ordinal name.
///
/// Any handler error counts as "not found".
pub async fn discover_by_network(
    handler: &dyn NetworkHandler,
    networks: &[Network],
    target: &Network,
    overrides: &[VmiNetworkInterface],
) -> Result<Link, DiscoveryError> {
    // Classify by the declared entry; the caller's copy may lack a source.
    let declared = networks
        .iter()
        .find(|n| n.name == target.name)
        .ok_or_else(|| DiscoveryError::NetworkNotDeclared {
            network: target.name.clone(),
        })?;

    let candidates = candidate_names(networks, declared, overrides);
    let mut attempted = Vec::with_capacity(candidates.len());

    for name in candidates {
        match handler.link_by_name(&name).await {
            Ok(link) => {
                debug!(network = %target.name, link = %link.name, "Resolved pod link");
                return Ok(link);
            }
            Err(e) => {
                debug!(network = %target.name, candidate = %name, error = %e, "Pod link lookup failed");
                attempted.push(name);
            }
        }
    }

    Err(DiscoveryError::LinkNotFound {
        network: target.name.clone(),
        attempted,
    })
}

fn candidate_names(
    networks: &[Network],
    target: &Network,
    overrides: &[VmiNetworkInterface],
) -> Vec<String> {
    if let Some(name) = pod_interface_name_override(&target.name, overrides) {
        return vec![name.to_string()];
    }

    if target.is_primary() {
        return vec![PRIMARY_POD_INTERFACE_NAME.to_string()];
    }

    let mut names = vec![hashed_pod_interface_name(target)];
    if let Some(ordinal) = ordinal_pod_interface_name(&target.name, networks) {
        names.push(ordinal);
    }
    names
}
