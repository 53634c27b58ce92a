//! Flattened per-interface view of a netplan document
//!
//! Read-only: used to answer "what is configured" queries and to prefill
//! update forms.

use crate::document::{BridgeSpec, InterfaceSpec, NetworkDocument, Route};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of one configured interface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSummary {
    pub dhcp: bool,
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Wi-Fi only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    /// Wi-Fi only; empty for an open network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid_password: Option<String>,
    /// Bridges only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

pub fn ethernet_interfaces(doc: &NetworkDocument) -> BTreeMap<String, InterfaceSummary> {
    doc.ethernets()
        .map(|ethernets| {
            ethernets
                .iter()
                .map(|(name, spec)| (name.clone(), summarize(spec)))
                .collect()
        })
        .unwrap_or_default()
}

pub fn wifi_interfaces(doc: &NetworkDocument) -> BTreeMap<String, InterfaceSummary> {
    doc.wifis()
        .map(|wifis| {
            wifis
                .iter()
                .map(|(name, spec)| {
                    let mut summary = summarize(spec);
                    // netplan allows several access points; the form edits one
                    let first_ap = spec.access_points.as_ref().and_then(|aps| aps.iter().next());
                    if let Some((ssid, ap)) = first_ap {
                        summary.ssid = Some(ssid.clone());
                        summary.ssid_password = Some(ap.password.clone().unwrap_or_default());
                    }
                    (name.clone(), summary)
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn bridge_interfaces(doc: &NetworkDocument) -> BTreeMap<String, InterfaceSummary> {
    doc.bridges()
        .map(|bridges| {
            bridges
                .iter()
                .map(|(name, spec)| (name.clone(), summarize_bridge(spec)))
                .collect()
        })
        .unwrap_or_default()
}

fn summarize(spec: &InterfaceSpec) -> InterfaceSummary {
    InterfaceSummary {
        dhcp: spec.dhcp4.unwrap_or(false),
        addresses: spec.addresses.clone().unwrap_or_default(),
        gateway: first_gateway(spec.routes.as_deref()),
        nameservers: spec.nameservers.as_ref().and_then(|ns| ns.addresses.clone()),
        mac: spec.match_.as_ref().and_then(|m| m.macaddress.clone()),
        ..Default::default()
    }
}

fn summarize_bridge(spec: &BridgeSpec) -> InterfaceSummary {
    InterfaceSummary {
        dhcp: spec.dhcp4.unwrap_or(false),
        addresses: spec.addresses.clone().unwrap_or_default(),
        gateway: first_gateway(spec.routes.as_deref()),
        nameservers: spec.nameservers.as_ref().and_then(|ns| ns.addresses.clone()),
        members: Some(spec.interfaces.clone()),
        ..Default::default()
    }
}

fn first_gateway(routes: Option<&[Route]>) -> Option<String> {
    routes?.first()?.via.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> NetworkDocument {
        NetworkDocument::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let d = doc("network:\n  version: 2\n");
        assert!(ethernet_interfaces(&d).is_empty());
        assert!(wifi_interfaces(&d).is_empty());
        assert!(bridge_interfaces(&d).is_empty());
        assert!(ethernet_interfaces(&NetworkDocument::default()).is_empty());
    }

    #[test]
    fn test_static_ethernet_summary() {
        let d = doc(r#"
network:
  ethernets:
    eth0:
      dhcp4: false
      match: {macaddress: "AA:BB:CC:DD:EE:01"}
      set-name: eth0
      addresses: [192.168.1.10/24]
      routes: [{to: default, via: 192.168.1.1}]
      nameservers: {addresses: [8.8.8.8, 1.1.1.1]}
"#);
        let eth0 = &ethernet_interfaces(&d)["eth0"];
        assert!(!eth0.dhcp);
        assert_eq!(eth0.addresses, vec!["192.168.1.10/24"]);
        assert_eq!(eth0.gateway.as_deref(), Some("192.168.1.1"));
        assert_eq!(eth0.nameservers, Some(vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()]));
        assert_eq!(eth0.mac.as_deref(), Some("AA:BB:CC:DD:EE:01"));
    }

    #[test]
    fn test_sparse_spec_uses_neutral_values() {
        let d = doc("network:\n  ethernets:\n    eth1: {}\n");
        assert_eq!(ethernet_interfaces(&d)["eth1"], InterfaceSummary::default());
    }

    #[test]
    fn test_wifi_summary_open_and_secured() {
        let d = doc(r#"
network:
  wifis:
    wlan0:
      dhcp4: true
      access-points:
        home: {password: hunter22}
    wlan1:
      access-points:
        guest: {}
"#);
        let wifis = wifi_interfaces(&d);
        assert!(wifis["wlan0"].dhcp);
        assert_eq!(wifis["wlan0"].ssid.as_deref(), Some("home"));
        assert_eq!(wifis["wlan0"].ssid_password.as_deref(), Some("hunter22"));
        assert_eq!(wifis["wlan1"].ssid.as_deref(), Some("guest"));
        assert_eq!(wifis["wlan1"].ssid_password.as_deref(), Some(""));
    }

    #[test]
    fn test_bridge_summary() {
        let d = doc(r#"
network:
  bridges:
    br0:
      interfaces: [eth0, eth1]
      addresses: [10.0.0.2/24]
"#);
        let br0 = &bridge_interfaces(&d)["br0"];
        assert_eq!(br0.members, Some(vec!["eth0".to_string(), "eth1".to_string()]));
        assert_eq!(br0.addresses, vec!["10.0.0.2/24"]);
        assert_eq!(br0.gateway, None);
        assert_eq!(br0.nameservers, None);
    }
}
