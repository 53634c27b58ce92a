//! Configuration management for netplanctl

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{NetplanError, NetplanResult};

/// Main netplanctl configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetplanctlConfig {
    /// netplan document locations, one per configuration domain
    #[serde(default)]
    pub documents: DocumentPaths,
    /// HTTP listener
    #[serde(default)]
    pub server: ServerSettings,
    /// How saved documents are applied
    #[serde(default)]
    pub activation: ActivationSettings,
    /// Wi-Fi connection polling
    #[serde(default)]
    pub probe: ProbeSettings,
    /// Reboot/shutdown behaviour
    #[serde(default)]
    pub station: StationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPaths {
    /// Static-IP Ethernet document
    #[serde(default = "default_ethernet_document")]
    pub ethernet: PathBuf,
    /// Wi-Fi document
    #[serde(default = "default_wifi_document")]
    pub wifi: PathBuf,
    /// Bridge document
    #[serde(default = "default_bridge_document")]
    pub bridge: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationSettings {
    /// Pause between flushing to disk and applying (milliseconds)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Command that renders and applies the saved documents
    #[serde(default = "default_apply_command")]
    pub apply_command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// `iwgetid <iface>` exits 0 when associated
    Iwgetid,
    /// `nmcli -t -f in-use,ssid dev wifi` marks the active network with `*`
    Nmcli,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_probe_method")]
    pub method: ProbeMethod,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds between attempts
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSettings {
    /// Seconds to wait before reboot/shutdown so the HTTP reply gets out
    #[serde(default = "default_action_delay_secs")]
    pub action_delay_secs: u64,
    /// Directory holding the front end's `*.log` files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Mode applied recursively to `log_dir` on request
    #[serde(default = "default_log_mode")]
    pub log_mode: u32,
}

fn default_ethernet_document() -> PathBuf {
    PathBuf::from("/etc/netplan/20-static-ip.yaml")
}

fn default_wifi_document() -> PathBuf {
    PathBuf::from("/etc/netplan/31-wifi-static.yaml")
}

fn default_bridge_document() -> PathBuf {
    PathBuf::from("/etc/netplan/01-netcfg.yaml")
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_apply_command() -> Vec<String> {
    vec!["netplan".to_string(), "apply".to_string()]
}

fn default_probe_method() -> ProbeMethod {
    ProbeMethod::Iwgetid
}

fn default_max_attempts() -> u32 {
    10
}

fn default_interval_secs() -> u64 {
    3
}

fn default_action_delay_secs() -> u64 {
    3
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/www/html/logs")
}

fn default_log_mode() -> u32 {
    0o777
}

impl Default for DocumentPaths {
    fn default() -> Self {
        Self {
            ethernet: default_ethernet_document(),
            wifi: default_wifi_document(),
            bridge: default_bridge_document(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            apply_command: default_apply_command(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            method: default_probe_method(),
            max_attempts: default_max_attempts(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            action_delay_secs: default_action_delay_secs(),
            log_dir: default_log_dir(),
            log_mode: default_log_mode(),
        }
    }
}

impl ActivationSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl ProbeSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl NetplanctlConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> NetplanResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NetplanError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| NetplanError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> NetplanResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NetplanError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| NetplanError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Override document paths and port from the environment
    /// (`NETPLAN_ETH`, `NETPLAN_WIFI`, `NETPLAN_BRIDGE`, `NETPLANCTL_PORT`)
    pub fn apply_env_overrides(&mut self) -> NetplanResult<()> {
        if let Ok(path) = std::env::var("NETPLAN_ETH") {
            self.documents.ethernet = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("NETPLAN_WIFI") {
            self.documents.wifi = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("NETPLAN_BRIDGE") {
            self.documents.bridge = PathBuf::from(path);
        }
        if let Ok(port) = std::env::var("NETPLANCTL_PORT") {
            self.server.port = port.parse().map_err(|_| {
                NetplanError::ConfigError(format!("Invalid NETPLANCTL_PORT '{}'", port))
            })?;
        }
        self.validate()
    }

    fn validate(&self) -> NetplanResult<()> {
        if self.activation.apply_command.is_empty() {
            return Err(NetplanError::ConfigError(
                "activation.apply_command cannot be empty".to_string(),
            ));
        }
        if self.station.log_mode > 0o7777 {
            return Err(NetplanError::ConfigError(format!(
                "station.log_mode {:o} is not a file mode",
                self.station.log_mode
            )));
        }
        if self.probe.max_attempts == 0 {
            return Err(NetplanError::ConfigError(
                "probe.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
