//! Host network interface queries
//!
//! Read-only view of the kernel's interfaces through sysfs

use crate::error::{NetplanError, NetplanResult};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const SYSFS_NET: &str = "/sys/class/net";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Ethernet,
    Wlan,
    Wwan,
}

impl InterfaceKind {
    /// Classify by the kernel's naming scheme (`eth*`/`en*`, `wl*`, `ww*`)
    pub fn classify(name: &str) -> Option<Self> {
        if name.starts_with("eth") || name.starts_with("en") {
            Some(InterfaceKind::Ethernet)
        } else if name.starts_with("wl") {
            Some(InterfaceKind::Wlan)
        } else if name.starts_with("ww") {
            Some(InterfaceKind::Wwan)
        } else {
            None
        }
    }
}

/// Interface controller
pub struct InterfaceController {
    sysfs_root: PathBuf,
}

impl InterfaceController {
    pub fn new() -> Self {
        Self::with_sysfs_root(SYSFS_NET)
    }

    /// Read interfaces from another directory laid out like `/sys/class/net`
    pub fn with_sysfs_root(root: impl Into<PathBuf>) -> Self {
        Self { sysfs_root: root.into() }
    }

    /// List all network interfaces
    pub async fn list(&self) -> NetplanResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.sysfs_root).await.map_err(|e| {
            NetplanError::NotFound(format!("{} not available: {}", self.sysfs_root.display(), e))
        })?;
        let mut interfaces = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                interfaces.push(name.to_string());
            }
        }

        interfaces.sort();
        Ok(interfaces)
    }

    /// Host interfaces grouped by kind; loopback and virtual devices are left out
    pub async fn list_classified(&self) -> NetplanResult<BTreeMap<InterfaceKind, Vec<String>>> {
        let mut grouped: BTreeMap<InterfaceKind, Vec<String>> = BTreeMap::new();
        for name in self.list().await? {
            if let Some(kind) = InterfaceKind::classify(&name) {
                grouped.entry(kind).or_default().push(name);
            }
        }
        Ok(grouped)
    }

    /// First wireless interface on the host
    pub async fn first_wifi(&self) -> NetplanResult<String> {
        for name in self.list().await? {
            if self.is_wireless(&name).await {
                debug!("Using Wi-Fi interface {}", name);
                return Ok(name);
            }
        }
        Err(NetplanError::InterfaceNotFound("no Wi-Fi interface present".to_string()))
    }

    /// Raw `operstate` (`up`, `down`, `dormant`, ...)
    pub async fn operstate(&self, interface: &str) -> NetplanResult<String> {
        validation::validate_interface_name(interface)?;

        let dir = self.sysfs_root.join(interface);
        if !dir.exists() {
            return Err(NetplanError::InterfaceNotFound(interface.to_string()));
        }

        Ok(self
            .read_sysfs_string(&dir, "operstate")
            .await
            .unwrap_or_else(|| "unknown".to_string()))
    }

    async fn is_wireless(&self, name: &str) -> bool {
        // Drivers expose a `wireless` directory; fall back to the name
        fs::metadata(self.sysfs_root.join(name).join("wireless")).await.is_ok()
            || InterfaceKind::classify(name) == Some(InterfaceKind::Wlan)
    }

    async fn read_sysfs_string(&self, dir: &Path, file: &str) -> Option<String> {
        fs::read_to_string(dir.join(file)).await.ok().map(|s| s.trim().to_string())
    }
}

impl Default for InterfaceController {
    fn default() -> Self {
        Self::new()
    }
}
