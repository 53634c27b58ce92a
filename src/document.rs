//! Typed netplan document model
//!
//! Mirrors the subset of the netplan v2 schema this service edits. Keys the
//! model does not name are captured in `extra` maps so hand-edited files
//! survive a load/save cycle.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// netplan schema version written on bootstrap
pub const NETPLAN_VERSION: u32 = 2;

/// Renderer written on bootstrap
pub const DEFAULT_RENDERER: &str = "NetworkManager";

/// Destination of the only route this service writes
pub const DEFAULT_ROUTE: &str = "default";

/// Unmodelled keys, kept verbatim
pub type Extra = BTreeMap<String, Value>;

/// A whole netplan file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// The `network:` mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernets: Option<BTreeMap<String, InterfaceSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifis: Option<BTreeMap<String, InterfaceSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridges: Option<BTreeMap<String, BridgeSpec>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// One interface entry under `ethernets` or `wifis`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp4: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp6: Option<bool>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_: Option<MatchSpec>,
    #[serde(rename = "set-name", default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Nameservers>,
    #[serde(rename = "access-points", default, skip_serializing_if = "Option::is_none")]
    pub access_points: Option<BTreeMap<String, AccessPoint>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// One bridge entry under `bridges`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp4: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Nameservers>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Route {
    /// Default route through `gateway`
    pub fn default_via(gateway: &str) -> Self {
        Self {
            to: DEFAULT_ROUTE.to_string(),
            via: Some(gateway.to_string()),
            extra: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nameservers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Nameservers {
    pub fn with_addresses(addresses: Vec<String>) -> Self {
        Self {
            addresses: Some(addresses),
            ..Default::default()
        }
    }
}

/// Credentials for one SSID. An empty mapping (`{}`) means an open network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl AccessPoint {
    /// Access point entry for `password`; empty means open.
    pub fn for_password(password: &str) -> Self {
        Self {
            password: if password.is_empty() {
                None
            } else {
                Some(password.to_string())
            },
            extra: Extra::new(),
        }
    }
}

impl NetworkDocument {
    /// Skeleton holding only version/renderer metadata
    pub fn bootstrap() -> Self {
        Self {
            network: Some(Network::bootstrap()),
            extra: Extra::new(),
        }
    }

    /// The `network:` mapping, created with bootstrap metadata when absent.
    /// Missing version/renderer on an existing mapping are filled in too.
    pub fn network_mut(&mut self) -> &mut Network {
        let network = self.network.get_or_insert_with(Network::bootstrap);
        network.version.get_or_insert(NETPLAN_VERSION);
        if network.renderer.is_none() {
            network.renderer = Some(DEFAULT_RENDERER.to_string());
        }
        network
    }

    pub fn ethernets(&self) -> Option<&BTreeMap<String, InterfaceSpec>> {
        self.network.as_ref()?.ethernets.as_ref()
    }

    pub fn wifis(&self) -> Option<&BTreeMap<String, InterfaceSpec>> {
        self.network.as_ref()?.wifis.as_ref()
    }

    pub fn bridges(&self) -> Option<&BTreeMap<String, BridgeSpec>> {
        self.network.as_ref()?.bridges.as_ref()
    }

    /// Parse YAML text. An empty file is an empty document.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

impl Network {
    fn bootstrap() -> Self {
        Self {
            version: Some(NETPLAN_VERSION),
            renderer: Some(DEFAULT_RENDERER.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HAND_EDITED: &str = r#"
network:
  version: 2
  renderer: networkd
  ethernets:
    eth0:
      dhcp4: false
      optional: true
      match:
        macaddress: "aa:bb:cc:dd:ee:01"
      set-name: eth0
      addresses:
        - 192.168.1.10/24
      routes:
        - to: default
          via: 192.168.1.1
          metric: 100
      nameservers:
        addresses: [8.8.8.8]
  wifis:
    wlan0:
      dhcp4: true
      dhcp6: true
      access-points:
        guest: {}
        home:
          password: secret123
"#;

    #[test]
    fn test_parse_hand_edited_document() {
        let doc = NetworkDocument::from_yaml(HAND_EDITED).unwrap();
        let network = doc.network.as_ref().unwrap();
        assert_eq!(network.version, Some(2));
        assert_eq!(network.renderer.as_deref(), Some("networkd"));

        let eth0 = &doc.ethernets().unwrap()["eth0"];
        assert_eq!(eth0.dhcp4, Some(false));
        assert_eq!(eth0.set_name.as_deref(), Some("eth0"));
        assert_eq!(
            eth0.match_.as_ref().unwrap().macaddress.as_deref(),
            Some("aa:bb:cc:dd:ee:01")
        );
        assert_eq!(eth0.extra.get("optional"), Some(&Value::Bool(true)));

        let route = &eth0.routes.as_ref().unwrap()[0];
        assert_eq!(route.via.as_deref(), Some("192.168.1.1"));
        assert!(route.extra.contains_key("metric"));

        let aps = doc.wifis().unwrap()["wlan0"].access_points.as_ref().unwrap();
        assert_eq!(aps["guest"], AccessPoint::default());
        assert_eq!(aps["home"].password.as_deref(), Some("secret123"));
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let doc = NetworkDocument::from_yaml(HAND_EDITED).unwrap();
        let text = doc.to_yaml().unwrap();
        assert!(text.contains("optional: true"));
        assert!(text.contains("metric: 100"));

        let reparsed = NetworkDocument::from_yaml(&text).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_open_access_point_serializes_as_empty_mapping() {
        let mut aps = BTreeMap::new();
        aps.insert("guest".to_string(), AccessPoint::for_password(""));
        let spec = InterfaceSpec {
            access_points: Some(aps),
            ..Default::default()
        };

        let text = serde_yaml::to_string(&spec).unwrap();
        assert!(text.contains("guest: {}"), "got: {}", text);
    }

    #[test]
    fn test_empty_text_is_empty_document() {
        let doc = NetworkDocument::from_yaml("  \n").unwrap();
        assert_eq!(doc, NetworkDocument::default());
    }

    #[test]
    fn test_network_mut_fills_metadata() {
        let mut doc = NetworkDocument::from_yaml("network:\n  ethernets: {}\n").unwrap();
        let network = doc.network_mut();
        assert_eq!(network.version, Some(NETPLAN_VERSION));
        assert_eq!(network.renderer.as_deref(), Some(DEFAULT_RENDERER));
        assert!(network.ethernets.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_bridge_without_members_stays_without() {
        let yaml = "network:\n  version: 2\n  bridges:\n    br0:\n      dhcp4: true\n";
        let doc = NetworkDocument::from_yaml(yaml).unwrap();
        assert!(doc.bridges().unwrap()["br0"].interfaces.is_empty());
        assert!(!doc.to_yaml().unwrap().contains("interfaces"));
    }
}
