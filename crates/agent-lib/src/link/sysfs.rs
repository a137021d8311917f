//! sysfs-backed network handler
//!
//! Reads link attributes from `/sys/class/net/<name>/`:
//! - ifindex, mtu, address, operstate
//! - uevent `DEVTYPE` and marker entries to classify the link

use super::{async_trait, Link, LinkError, LinkKind, NetworkHandler, OperState};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default location of per-link sysfs directories
pub const DEFAULT_SYSFS_NET_ROOT: &str = "/sys/class/net";

/// Network handler reading link state from sysfs
pub struct SysfsNetworkHandler {
    net_root: PathBuf,
}

impl Default for SysfsNetworkHandler {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_NET_ROOT)
    }
}

impl SysfsNetworkHandler {
    /// Create a handler rooted at a custom path (for testing or a mounted netns)
    pub fn new(net_root: impl Into<PathBuf>) -> Self {
        Self {
            net_root: net_root.into(),
        }
    }

    pub fn net_root(&self) -> &Path {
        &self.net_root
    }

    /// Parse the `DEVTYPE=` entry of a uevent file
    pub fn parse_devtype(uevent: &str) -> Option<&str> {
        uevent
            .lines()
            .find_map(|line| line.trim().strip_prefix("DEVTYPE="))
    }

    /// Normalize a link address; all-zero addresses count as absent
    pub fn parse_address(content: &str) -> Option<String> {
        let address = content.trim();
        if address.is_empty() || address.chars().all(|c| c == '0' || c == ':') {
            None
        } else {
            Some(address.to_lowercase())
        }
    }

    async fn read_attr(&self, name: &str, link_dir: &Path, file: &str) -> Result<String, LinkError> {
        let path = link_dir.join(file);
        fs::read_to_string(&path).await.map_err(|source| LinkError::Io {
            name: name.to_string(),
            path,
            source,
        })
    }

    async fn read_number(
        &self,
        name: &str,
        link_dir: &Path,
        file: &'static str,
    ) -> Result<u32, LinkError> {
        let content = self.read_attr(name, link_dir, file).await?;
        content.trim().parse().map_err(|_| LinkError::Parse {
            name: name.to_string(),
            file,
            value: content.trim().to_string(),
        })
    }

    async fn detect_kind(&self, link_dir: &Path) -> LinkKind {
        if let Ok(uevent) = fs::read_to_string(link_dir.join("uevent")).await {
            match Self::parse_devtype(&uevent) {
                Some("bridge") => return LinkKind::Bridge,
                Some("bond") => return LinkKind::Bond,
                Some("vlan") => return LinkKind::Vlan,
                _ => {}
            }
        }

        if exists(&link_dir.join("bridge")).await {
            LinkKind::Bridge
        } else if exists(&link_dir.join("bonding")).await {
            LinkKind::Bond
        } else if exists(&link_dir.join("tun_flags")).await {
            LinkKind::Tun
        } else if exists(&link_dir.join("device")).await {
            LinkKind::Device
        } else {
            LinkKind::Virtual
        }
    }
}

async fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Kernel interface names are at most 15 bytes and never contain '/'
fn is_valid_link_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 15
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.chars().any(char::is_whitespace)
}

#[async_trait]
impl NetworkHandler for SysfsNetworkHandler {
    async fn link_by_name(&self, name: &str) -> Result<Link, LinkError> {
        if !is_valid_link_name(name) {
            return Err(LinkError::NotFound(name.to_string()));
        }

        let link_dir = self.net_root.join(name);
        match fs::metadata(&link_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(LinkError::NotFound(name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LinkError::NotFound(name.to_string()))
            }
            Err(source) => {
                return Err(LinkError::Io {
                    name: name.to_string(),
                    path: link_dir,
                    source,
                })
            }
        }

        let index = self.read_number(name, &link_dir, "ifindex").await?;
        let mtu = self.read_number(name, &link_dir, "mtu").await?;

        let mac = match self.read_attr(name, &link_dir, "address").await {
            Ok(content) => Self::parse_address(&content),
            Err(_) => None,
        };

        let oper_state = match self.read_attr(name, &link_dir, "operstate").await {
            Ok(content) => OperState::parse(&content),
            Err(_) => OperState::Unknown,
        };

        let kind = self.detect_kind(&link_dir).await;

        Ok(Link {
            name: name.to_string(),
            index,
            mtu,
            mac,
            oper_state,
            kind,
        })
    }
}
