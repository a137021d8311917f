//! Pod network link discovery
//!
//! Resolves which kernel network interface in the pod network namespace
//! backs a logical VMI network. Lookups go through the [`NetworkHandler`]
//! collaborator; the production handler reads link state from sysfs.

mod discovery;
pub mod namescheme;
mod sysfs;


pub use discovery::{discover_by_network, DiscoveryError};
pub use sysfs::{SysfsNetworkHandler, DEFAULT_SYSFS_NET_ROOT};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use async_trait::async_trait;

/// Operational state of a link as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    Up,
    Down,
    Dormant,
    LowerLayerDown,
    NotPresent,
    Testing,
    Unknown,
}

impl OperState {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "up" => OperState::Up,
            "down" => OperState::Down,
            "dormant" => OperState::Dormant,
            "lowerlayerdown" => OperState::LowerLayerDown,
            "notpresent" => OperState::NotPresent,
            "testing" => OperState::Testing,
            _ => OperState::Unknown,
        }
    }
}

/// Link type, as far as it can be told from sysfs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Bridge,
    Bond,
    Vlan,
    Tun,
    Device,
    Virtual,
}

/// A kernel network interface, read-only snapshot of its attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub index: u32,
    pub mtu: u32,
    pub mac: Option<String>,
    pub oper_state: OperState,
    pub kind: LinkKind,
}

impl Link {
    /// Minimal link with only a name, the rest defaulted
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: 0,
            mtu: 1500,
            mac: None,
            oper_state: OperState::Unknown,
            kind: LinkKind::Virtual,
        }
    }
}

/// Errors raised by a [`NetworkHandler`]
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link {0} not found")]
    NotFound(String),

    #[error("failed to read {} for link {name}", .path.display())]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {file} for link {name}: {value:?}")]
    Parse {
        name: String,
        file: &'static str,
        value: String,
    },
}

/// Access to the host network stack
///
/// Implementations only read link state; they must never mutate it.
#[async_trait]
pub trait NetworkHandler: Send + Sync {
    /// Look up a link by its exact interface name
    async fn link_by_name(&self, name: &str) -> Result<Link, LinkError>;
}
