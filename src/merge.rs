//! netplan document merge rules
//!
//! Every operation takes the current document and a change request and
//! returns the next document. No I/O happens here; callers load and save
//! through [`crate::store::DocumentStore`].
//!
//! Rules shared by all operations:
//! - a field without a value is omitted, never stored as an empty list or
//!   mapping (the open-network access point `{}` is the one exception)
//! - a non-empty gateway is the only thing that creates `routes`
//! - the targeted entry (or section) is replaced wholesale; nothing from the
//!   previous entry is carried over
//! - writing an Ethernet plan drops `bridges`; writing a bridge replaces its
//!   two member Ethernet entries and leaves other Ethernet entries alone

use crate::document::{
    AccessPoint, BridgeSpec, InterfaceSpec, MatchSpec, Nameservers, NetworkDocument, Route,
};
use crate::error::{NetplanError, NetplanResult};
use crate::extract;
use crate::validation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Name of the bridge this service manages
pub const BRIDGE_NAME: &str = "br0";

/// The two onboard NICs a bridge aggregates
pub const BRIDGE_MEMBERS: [&str; 2] = ["eth0", "eth1"];

/// Prefix appended to addresses given without one
pub const DEFAULT_PREFIX: &str = "/24";

/// Physical Ethernet slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EthernetSlot {
    Primary,
    Secondary,
}

impl EthernetSlot {
    /// Stable interface name pinned through `set-name`
    pub fn interface(self) -> &'static str {
        match self {
            EthernetSlot::Primary => BRIDGE_MEMBERS[0],
            EthernetSlot::Secondary => BRIDGE_MEMBERS[1],
        }
    }
}

impl FromStr for EthernetSlot {
    type Err = NetplanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "eth0" | "1" => Ok(EthernetSlot::Primary),
            "secondary" | "eth1" | "2" => Ok(EthernetSlot::Secondary),
            other => Err(NetplanError::InvalidParameter(format!(
                "Unknown Ethernet slot '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for EthernetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interface())
    }
}

/// New addressing for one Ethernet slot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EthernetPlan {
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub dhcp: bool,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(rename = "deleteEth", default)]
    pub delete: bool,
}

/// Bridge over both onboard NICs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgePlan {
    #[serde(default)]
    pub mac1: String,
    #[serde(default)]
    pub mac2: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub nameservers: Vec<String>,
}

/// Credentials for a first-time Wi-Fi connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WifiProfile {
    pub ssid: String,
    #[serde(rename = "ssidPassword", default)]
    pub password: String,
}

/// Replacement profile for an already configured Wi-Fi interface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WifiUpdate {
    pub ssid: String,
    #[serde(rename = "ssidPassword", default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// One address, or several separated by commas
    #[serde(rename = "staticAddress", default)]
    pub static_address: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub nameservers: Vec<String>,
}

impl WifiUpdate {
    fn addresses(&self) -> Vec<String> {
        clean(self.static_address.split(',').map(str::to_string).collect::<Vec<_>>().as_slice())
    }
}

/// Upsert or delete the entry for `slot` in `ethernets`.
pub fn set_ethernet_plan(
    mut doc: NetworkDocument,
    slot: EthernetSlot,
    plan: &EthernetPlan,
) -> NetplanResult<NetworkDocument> {
    let name = slot.interface();
    let network = doc.network_mut();

    if plan.delete {
        if let Some(ethernets) = network.ethernets.as_mut() {
            if ethernets.remove(name).is_some() {
                info!("Removed Ethernet interface {}", name);
            } else {
                debug!("Ethernet interface {} already absent", name);
            }
            if ethernets.is_empty() {
                network.ethernets = None;
            }
        }
        return Ok(doc);
    }

    let spec = ethernet_spec(name, plan);
    network
        .ethernets
        .get_or_insert_with(BTreeMap::new)
        .insert(name.to_string(), spec);

    if network.bridges.take().is_some() {
        info!("Ethernet plan for {} replaced the bridge configuration", name);
    }

    Ok(doc)
}

/// Replace `bridges` with a single bridge over both onboard NICs and turn
/// the members into unaddressed slaves.
pub fn set_bridge_plan(
    mut doc: NetworkDocument,
    plan: &BridgePlan,
) -> NetplanResult<NetworkDocument> {
    let macs = [
        require("mac1", &plan.mac1)?,
        require("mac2", &plan.mac2)?,
    ];

    let gateway = non_blank(&plan.gateway);
    let bridge = BridgeSpec {
        interfaces: BRIDGE_MEMBERS.iter().map(|m| m.to_string()).collect(),
        addresses: non_empty(normalize_addresses(&plan.addresses)),
        // Without a gateway the bridge drops its resolvers along with the route
        nameservers: gateway.and_then(|_| nameservers(&plan.nameservers)),
        routes: gateway.map(|gw| vec![Route::default_via(gw)]),
        ..Default::default()
    };

    let network = doc.network_mut();
    network.bridges = Some(BTreeMap::from([(BRIDGE_NAME.to_string(), bridge)]));

    let ethernets = network.ethernets.get_or_insert_with(BTreeMap::new);
    for (member, mac) in BRIDGE_MEMBERS.iter().zip(macs) {
        ethernets.insert(member.to_string(), slave_spec(member, mac));
    }

    info!("Bridge {} configured over {:?}", BRIDGE_NAME, BRIDGE_MEMBERS);
    Ok(doc)
}

/// Drop `bridges`. Used on the bridge document when an Ethernet plan is
/// written to a different file.
pub fn clear_bridges(mut doc: NetworkDocument) -> NetplanResult<NetworkDocument> {
    if let Some(network) = doc.network.as_mut() {
        if network.bridges.take().is_some() {
            info!("Bridge configuration removed");
        }
    }
    Ok(doc)
}

/// Remove the bridge members from `ethernets`. Used on the Ethernet document
/// when the bridge lives in a different file.
pub fn release_bridge_members(mut doc: NetworkDocument) -> NetplanResult<NetworkDocument> {
    if let Some(network) = doc.network.as_mut() {
        if let Some(ethernets) = network.ethernets.as_mut() {
            for member in BRIDGE_MEMBERS {
                if ethernets.remove(member).is_some() {
                    debug!("Released {} for the bridge", member);
                }
            }
            if ethernets.is_empty() {
                network.ethernets = None;
            }
        }
    }
    Ok(doc)
}

/// DHCP-only profile for `interface`, creating `wifis` if needed.
pub fn create_wifi_profile(
    mut doc: NetworkDocument,
    interface: &str,
    profile: &WifiProfile,
) -> NetplanResult<NetworkDocument> {
    check_interface(interface)?;
    check_ssid(&profile.ssid)?;

    let spec = InterfaceSpec {
        dhcp4: Some(true),
        dhcp6: Some(true),
        access_points: Some(access_points(&profile.ssid, &profile.password)),
        ..Default::default()
    };

    doc.network_mut()
        .wifis
        .get_or_insert_with(BTreeMap::new)
        .insert(interface.to_string(), spec);

    info!("Created Wi-Fi profile for {} (ssid '{}')", interface, profile.ssid);
    Ok(doc)
}

/// Replace the whole entry for `interface`. Static addressing is used when
/// the update carries addresses, DHCP otherwise.
pub fn update_wifi_profile(
    mut doc: NetworkDocument,
    interface: &str,
    update: &WifiUpdate,
) -> NetplanResult<NetworkDocument> {
    check_interface(interface)?;
    check_ssid(&update.ssid)?;

    let addresses = normalize_addresses(&update.addresses());
    let access_points = Some(access_points(&update.ssid, &update.password));

    let spec = if addresses.is_empty() {
        InterfaceSpec {
            dhcp4: Some(true),
            dhcp6: Some(true),
            access_points,
            ..Default::default()
        }
    } else {
        InterfaceSpec {
            dhcp4: Some(false),
            dhcp6: Some(false),
            addresses: Some(addresses),
            routes: non_blank(&update.gateway).map(|gw| vec![Route::default_via(gw)]),
            nameservers: nameservers(&update.nameservers),
            access_points,
            ..Default::default()
        }
    };

    doc.network_mut()
        .wifis
        .get_or_insert_with(BTreeMap::new)
        .insert(interface.to_string(), spec);

    info!("Updated Wi-Fi profile for {} (ssid '{}')", interface, update.ssid);
    Ok(doc)
}

/// Drop the whole `wifis` section. Every Wi-Fi interface loses its
/// configuration, not only the one a caller had in mind.
pub fn delete_wifi_profile(mut doc: NetworkDocument) -> NetplanResult<NetworkDocument> {
    if let Some(network) = doc.network.as_mut() {
        if network.wifis.take().is_some() {
            info!("Removed wifis section");
        }
    }
    Ok(doc)
}

/// Wi-Fi interface an update should target: the requested one, otherwise the
/// first interface already configured in `doc`.
pub fn resolve_wifi_interface(doc: &NetworkDocument, requested: Option<&str>) -> Option<String> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => Some(name.to_string()),
        None => extract::wifi_interfaces(doc).into_keys().next(),
    }
}

/// Append [`DEFAULT_PREFIX`] to every address given without a prefix.
pub fn normalize_addresses(addresses: &[String]) -> Vec<String> {
    clean(addresses)
        .into_iter()
        .map(|addr| {
            if addr.contains('/') {
                addr
            } else {
                format!("{}{}", addr, DEFAULT_PREFIX)
            }
        })
        .collect()
}

fn ethernet_spec(name: &str, plan: &EthernetPlan) -> InterfaceSpec {
    let mut spec = slave_spec(name, &plan.mac);

    if plan.dhcp {
        spec.dhcp4 = Some(true);
        spec.dhcp6 = Some(false);
        return spec;
    }

    spec.dhcp6 = Some(false);
    spec.addresses = non_empty(normalize_addresses(&plan.addresses));
    spec.routes = non_blank(&plan.gateway).map(|gw| vec![Route::default_via(gw)]);
    spec.nameservers = nameservers(&plan.nameservers);
    spec
}

/// `match` + `set-name` only; a blank MAC leaves the NIC unpinned.
fn slave_spec(name: &str, mac: &str) -> InterfaceSpec {
    let pinned = non_blank(mac);
    InterfaceSpec {
        dhcp4: Some(false),
        match_: pinned.map(|mac| MatchSpec {
            macaddress: Some(mac.to_string()),
            ..Default::default()
        }),
        set_name: pinned.map(|_| name.to_string()),
        ..Default::default()
    }
}

fn access_points(ssid: &str, password: &str) -> BTreeMap<String, AccessPoint> {
    BTreeMap::from([(ssid.to_string(), AccessPoint::for_password(password))])
}

fn nameservers(addresses: &[String]) -> Option<Nameservers> {
    non_empty(clean(addresses)).map(Nameservers::with_addresses)
}

fn check_ssid(ssid: &str) -> NetplanResult<()> {
    validation::validate_ssid(ssid).map_err(|e| NetplanError::InvalidChange(e.to_string()))
}

fn check_interface(name: &str) -> NetplanResult<()> {
    validation::validate_interface_name(name)
        .map_err(|e| NetplanError::InvalidChange(e.to_string()))
}

fn require<'a>(field: &str, value: &'a str) -> NetplanResult<&'a str> {
    non_blank(value)
        .ok_or_else(|| NetplanError::InvalidChange(format!("Missing required field '{}'", field)))
}

fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

fn clean(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DEFAULT_RENDERER, NETPLAN_VERSION};

    fn static_plan() -> EthernetPlan {
        EthernetPlan {
            mac: "AA:BB:CC:DD:EE:01".to_string(),
            dhcp: false,
            gateway: "192.168.1.1".to_string(),
            addresses: vec!["192.168.1.10/24".to_string()],
            nameservers: vec!["8.8.8.8".to_string()],
            delete: false,
        }
    }

    fn fresh_ethernet(slot: EthernetSlot, plan: &EthernetPlan) -> NetworkDocument {
        set_ethernet_plan(NetworkDocument::default(), slot, plan).unwrap()
    }

    fn bridge_plan() -> BridgePlan {
        BridgePlan {
            mac1: "AA:BB:CC:DD:EE:01".to_string(),
            mac2: "AA:BB:CC:DD:EE:02".to_string(),
            gateway: "10.0.0.1".to_string(),
            addresses: vec!["10.0.0.2/24".to_string()],
            nameservers: vec!["1.1.1.1".to_string()],
        }
    }

    fn wifi_update(addresses: &str, gateway: &str) -> WifiUpdate {
        WifiUpdate {
            ssid: "home".to_string(),
            password: "hunter22".to_string(),
            interface: Some("wlan0".to_string()),
            static_address: addresses.to_string(),
            gateway: gateway.to_string(),
            nameservers: vec![],
        }
    }

    #[test]
    fn test_slot_parsing() {
        assert_eq!("primary".parse::<EthernetSlot>().unwrap(), EthernetSlot::Primary);
        assert_eq!("ETH1".parse::<EthernetSlot>().unwrap(), EthernetSlot::Secondary);
        assert_eq!("2".parse::<EthernetSlot>().unwrap(), EthernetSlot::Secondary);
        assert!("eth2".parse::<EthernetSlot>().is_err());
        assert_eq!(EthernetSlot::Secondary.to_string(), "eth1");
    }

    #[test]
    fn test_static_ethernet_plan() {
        let doc = fresh_ethernet(EthernetSlot::Primary, &static_plan());

        let network = doc.network.as_ref().unwrap();
        assert_eq!(network.version, Some(NETPLAN_VERSION));
        assert_eq!(network.renderer.as_deref(), Some(DEFAULT_RENDERER));

        let eth0 = &doc.ethernets().unwrap()["eth0"];
        assert_eq!(eth0.dhcp4, Some(false));
        assert_eq!(eth0.set_name.as_deref(), Some("eth0"));
        assert_eq!(eth0.match_.as_ref().unwrap().macaddress.as_deref(), Some("AA:BB:CC:DD:EE:01"));
        assert_eq!(eth0.addresses, Some(vec!["192.168.1.10/24".to_string()]));
        assert_eq!(eth0.routes, Some(vec![Route::default_via("192.168.1.1")]));
        assert_eq!(
            eth0.nameservers.as_ref().unwrap().addresses,
            Some(vec!["8.8.8.8".to_string()])
        );
    }

    #[test]
    fn test_dhcp_ethernet_plan_has_no_static_fields() {
        let plan = EthernetPlan { dhcp: true, ..static_plan() };
        let doc = fresh_ethernet(EthernetSlot::Secondary, &plan);

        let eth1 = &doc.ethernets().unwrap()["eth1"];
        assert_eq!(eth1.dhcp4, Some(true));
        assert_eq!(eth1.dhcp6, Some(false));
        assert_eq!(eth1.set_name.as_deref(), Some("eth1"));
        assert!(eth1.addresses.is_none());
        assert!(eth1.routes.is_none());
        assert!(eth1.nameservers.is_none());
    }

    #[test]
    fn test_ethernet_without_gateway_or_resolvers_omits_keys() {
        let plan = EthernetPlan {
            gateway: "  ".to_string(),
            nameservers: vec!["".to_string()],
            ..static_plan()
        };
        let doc = fresh_ethernet(EthernetSlot::Primary, &plan);

        let eth0 = &doc.ethernets().unwrap()["eth0"];
        assert!(eth0.routes.is_none());
        assert!(eth0.nameservers.is_none());
        assert!(eth0.addresses.is_some());

        let yaml = doc.to_yaml().unwrap();
        assert!(!yaml.contains("routes"));
        assert!(!yaml.contains("nameservers"));
    }

    #[test]
    fn test_ethernet_plan_replaces_previous_entry() {
        let doc = fresh_ethernet(EthernetSlot::Primary, &static_plan());
        let plan = EthernetPlan {
            gateway: String::new(),
            nameservers: vec![],
            addresses: vec!["192.168.5.5".to_string()],
            ..static_plan()
        };
        let doc = set_ethernet_plan(doc, EthernetSlot::Primary, &plan).unwrap();

        let eth0 = &doc.ethernets().unwrap()["eth0"];
        assert_eq!(eth0.addresses, Some(vec!["192.168.5.5/24".to_string()]));
        assert!(eth0.routes.is_none());
        assert!(eth0.nameservers.is_none());
    }

    #[test]
    fn test_ethernet_blank_mac_is_unpinned() {
        let plan = EthernetPlan { mac: String::new(), ..static_plan() };
        let doc = fresh_ethernet(EthernetSlot::Primary, &plan);

        let eth0 = &doc.ethernets().unwrap()["eth0"];
        assert!(eth0.match_.is_none());
        assert!(eth0.set_name.is_none());
    }

    #[test]
    fn test_ethernet_plan_clears_bridges() {
        let doc = set_bridge_plan(NetworkDocument::default(), &bridge_plan()).unwrap();
        assert!(doc.bridges().is_some());

        for slot in [EthernetSlot::Primary, EthernetSlot::Secondary] {
            let next = set_ethernet_plan(doc.clone(), slot, &static_plan()).unwrap();
            assert!(next.bridges().is_none(), "bridges survived plan for {}", slot);
        }
    }

    #[test]
    fn test_delete_ethernet_is_idempotent() {
        let doc = fresh_ethernet(EthernetSlot::Primary, &static_plan());
        let doc = set_ethernet_plan(doc, EthernetSlot::Secondary, &static_plan()).unwrap();
        let delete = EthernetPlan { delete: true, ..Default::default() };

        let once = set_ethernet_plan(doc, EthernetSlot::Primary, &delete).unwrap();
        let twice = set_ethernet_plan(once.clone(), EthernetSlot::Primary, &delete).unwrap();

        assert_eq!(once, twice);
        assert!(!once.ethernets().unwrap().contains_key("eth0"));
        assert!(once.ethernets().unwrap().contains_key("eth1"));
    }

    #[test]
    fn test_delete_keeps_bridges() {
        let doc = set_bridge_plan(NetworkDocument::default(), &bridge_plan()).unwrap();
        let delete = EthernetPlan { delete: true, ..Default::default() };
        let doc = set_ethernet_plan(doc, EthernetSlot::Primary, &delete).unwrap();
        assert!(doc.bridges().is_some());
    }

    #[test]
    fn test_delete_last_ethernet_drops_section() {
        let doc = fresh_ethernet(EthernetSlot::Primary, &static_plan());
        let delete = EthernetPlan { delete: true, ..Default::default() };
        let doc = set_ethernet_plan(doc, EthernetSlot::Primary, &delete).unwrap();
        assert!(doc.ethernets().is_none());
    }

    #[test]
    fn test_bridge_plan_builds_bridge_and_slaves() {
        let doc = set_bridge_plan(NetworkDocument::default(), &bridge_plan()).unwrap();

        let br0 = &doc.bridges().unwrap()[BRIDGE_NAME];
        assert_eq!(br0.interfaces, vec!["eth0", "eth1"]);
        assert_eq!(br0.addresses, Some(vec!["10.0.0.2/24".to_string()]));
        assert_eq!(br0.routes, Some(vec![Route::default_via("10.0.0.1")]));
        assert_eq!(br0.nameservers.as_ref().unwrap().addresses, Some(vec!["1.1.1.1".to_string()]));

        let ethernets = doc.ethernets().unwrap();
        for (name, mac) in [("eth0", "AA:BB:CC:DD:EE:01"), ("eth1", "AA:BB:CC:DD:EE:02")] {
            let slave = &ethernets[name];
            assert_eq!(slave.dhcp4, Some(false));
            assert_eq!(slave.set_name.as_deref(), Some(name));
            assert_eq!(slave.match_.as_ref().unwrap().macaddress.as_deref(), Some(mac));
            assert!(slave.addresses.is_none());
            assert!(slave.routes.is_none());
            assert!(slave.nameservers.is_none());
        }
    }

    #[test]
    fn test_bridge_without_gateway_drops_routes_and_nameservers() {
        let plan = BridgePlan { gateway: String::new(), ..bridge_plan() };
        let doc = set_bridge_plan(NetworkDocument::default(), &plan).unwrap();

        let br0 = &doc.bridges().unwrap()[BRIDGE_NAME];
        assert!(br0.routes.is_none());
        assert!(br0.nameservers.is_none());
        assert!(br0.addresses.is_some());
    }

    #[test]
    fn test_bridge_replaces_members_only() {
        let doc = NetworkDocument::from_yaml(r#"
network:
  version: 2
  ethernets:
    eth0:
      dhcp4: true
    enp4s0:
      dhcp4: true
  bridges:
    br9:
      interfaces: [enp4s0]
"#).unwrap();
        let doc = set_bridge_plan(doc, &bridge_plan()).unwrap();

        let ethernets = doc.ethernets().unwrap();
        assert_eq!(ethernets["eth0"].dhcp4, Some(false));
        assert_eq!(ethernets["enp4s0"].dhcp4, Some(true));

        let bridges = doc.bridges().unwrap();
        assert_eq!(bridges.len(), 1);
        assert!(bridges.contains_key(BRIDGE_NAME));
    }

    #[test]
    fn test_cross_document_helpers() {
        let doc = set_bridge_plan(NetworkDocument::default(), &bridge_plan()).unwrap();
        let cleared = clear_bridges(doc.clone()).unwrap();
        assert!(cleared.bridges().is_none());
        assert!(cleared.ethernets().is_some());

        let eth = fresh_ethernet(EthernetSlot::Primary, &static_plan());
        let released = release_bridge_members(eth).unwrap();
        assert!(released.ethernets().is_none());

        // Nothing to do on an empty document
        assert_eq!(
            release_bridge_members(NetworkDocument::default()).unwrap(),
            NetworkDocument::default()
        );
        assert_eq!(clear_bridges(NetworkDocument::default()).unwrap(), NetworkDocument::default());
    }

    #[test]
    fn test_bridge_requires_both_macs() {
        for plan in [
            BridgePlan { mac1: String::new(), ..bridge_plan() },
            BridgePlan { mac2: " ".to_string(), ..bridge_plan() },
        ] {
            let err = set_bridge_plan(NetworkDocument::default(), &plan).unwrap_err();
            assert!(matches!(err, NetplanError::InvalidChange(_)), "got {:?}", err);
        }
    }

    #[test]
    fn test_create_wifi_profile_bootstraps_section() {
        let profile = WifiProfile { ssid: "home".to_string(), password: "hunter22".to_string() };
        let doc = create_wifi_profile(NetworkDocument::default(), "wlan0", &profile).unwrap();

        let wlan0 = &doc.wifis().unwrap()["wlan0"];
        assert_eq!(wlan0.dhcp4, Some(true));
        assert_eq!(wlan0.dhcp6, Some(true));
        assert_eq!(
            wlan0.access_points.as_ref().unwrap()["home"].password.as_deref(),
            Some("hunter22")
        );
        assert_eq!(doc.network.as_ref().unwrap().version, Some(NETPLAN_VERSION));
    }

    #[test]
    fn test_create_open_wifi_profile() {
        let profile = WifiProfile { ssid: "guest".to_string(), password: String::new() };
        let doc = create_wifi_profile(NetworkDocument::default(), "wlan0", &profile).unwrap();

        let aps = doc.wifis().unwrap()["wlan0"].access_points.clone().unwrap();
        assert_eq!(aps.len(), 1);
        assert_eq!(aps["guest"], AccessPoint::default());
    }

    #[test]
    fn test_create_wifi_requires_ssid() {
        let profile = WifiProfile { ssid: String::new(), password: "x".to_string() };
        let err = create_wifi_profile(NetworkDocument::default(), "wlan0", &profile).unwrap_err();
        assert!(matches!(err, NetplanError::InvalidChange(_)));

        let profile = WifiProfile { ssid: "home".to_string(), password: String::new() };
        let err = create_wifi_profile(NetworkDocument::default(), "wlan0; reboot", &profile)
            .unwrap_err();
        assert!(matches!(err, NetplanError::InvalidChange(_)));
    }

    #[test]
    fn test_update_wifi_normalizes_addresses() {
        let doc = update_wifi_profile(
            NetworkDocument::default(),
            "wlan0",
            &wifi_update("192.168.1.21, 10.0.0.5/16", ""),
        )
        .unwrap();

        let wlan0 = &doc.wifis().unwrap()["wlan0"];
        assert_eq!(wlan0.dhcp4, Some(false));
        assert_eq!(wlan0.dhcp6, Some(false));
        assert_eq!(
            wlan0.addresses,
            Some(vec!["192.168.1.21/24".to_string(), "10.0.0.5/16".to_string()])
        );
        assert!(wlan0.routes.is_none());
        assert!(wlan0.nameservers.is_none());
        assert!(wlan0.access_points.as_ref().unwrap().contains_key("home"));
    }

    #[test]
    fn test_update_wifi_replaces_entry_and_keeps_others() {
        let doc = NetworkDocument::from_yaml(r#"
network:
  version: 2
  renderer: NetworkManager
  ethernets:
    eth0: {dhcp4: true}
  wifis:
    wlan0:
      dhcp4: false
      optional: true
      addresses: [192.168.1.50/24]
      nameservers: {addresses: [9.9.9.9]}
      access-points:
        old: {password: oldpass1}
    wlan1:
      dhcp4: true
      access-points:
        other: {}
"#).unwrap();

        let mut update = wifi_update("192.168.1.21", "192.168.1.1");
        update.nameservers = vec!["8.8.8.8".to_string()];
        let doc = update_wifi_profile(doc, "wlan0", &update).unwrap();

        let wifis = doc.wifis().unwrap();
        let wlan0 = &wifis["wlan0"];
        assert!(wlan0.extra.is_empty(), "hand-edited keys must not be inherited");
        assert_eq!(wlan0.routes, Some(vec![Route::default_via("192.168.1.1")]));
        assert_eq!(
            wlan0.nameservers.as_ref().unwrap().addresses,
            Some(vec!["8.8.8.8".to_string()])
        );
        let aps = wlan0.access_points.as_ref().unwrap();
        assert_eq!(aps.len(), 1);
        assert!(aps.contains_key("home"));

        assert!(wifis.contains_key("wlan1"));
        assert!(doc.ethernets().unwrap().contains_key("eth0"));
    }

    #[test]
    fn test_update_wifi_without_addresses_uses_dhcp() {
        let mut update = wifi_update("", "192.168.1.1");
        update.nameservers = vec!["8.8.8.8".to_string()];
        let doc = update_wifi_profile(NetworkDocument::default(), "wlan0", &update).unwrap();

        let wlan0 = &doc.wifis().unwrap()["wlan0"];
        assert_eq!(wlan0.dhcp4, Some(true));
        assert!(wlan0.addresses.is_none());
        assert!(wlan0.routes.is_none());
        assert!(wlan0.nameservers.is_none());
    }

    #[test]
    fn test_gateway_controls_routes() {
        for gateway in ["", "192.168.1.1"] {
            let eth = set_ethernet_plan(
                NetworkDocument::default(),
                EthernetSlot::Primary,
                &EthernetPlan { gateway: gateway.to_string(), ..static_plan() },
            )
            .unwrap();
            let br = set_bridge_plan(
                NetworkDocument::default(),
                &BridgePlan { gateway: gateway.to_string(), ..bridge_plan() },
            )
            .unwrap();
            let wifi = update_wifi_profile(
                NetworkDocument::default(),
                "wlan0",
                &wifi_update("192.168.1.21", gateway),
            )
            .unwrap();

            let expected = !gateway.is_empty();
            assert_eq!(eth.ethernets().unwrap()["eth0"].routes.is_some(), expected);
            assert_eq!(br.bridges().unwrap()[BRIDGE_NAME].routes.is_some(), expected);
            assert_eq!(wifi.wifis().unwrap()["wlan0"].routes.is_some(), expected);
        }
    }

    #[test]
    fn test_delete_wifi_removes_whole_section() {
        let profile = WifiProfile { ssid: "home".to_string(), password: String::new() };
        let doc = create_wifi_profile(NetworkDocument::default(), "wlan0", &profile).unwrap();
        let doc = create_wifi_profile(doc, "wlan1", &profile).unwrap();

        let doc = delete_wifi_profile(doc).unwrap();
        assert!(doc.wifis().is_none());

        let again = delete_wifi_profile(doc.clone()).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_resolve_wifi_interface() {
        let profile = WifiProfile { ssid: "home".to_string(), password: String::new() };
        let doc = create_wifi_profile(NetworkDocument::default(), "wlp3s0", &profile).unwrap();

        assert_eq!(resolve_wifi_interface(&doc, Some("wlan0")).as_deref(), Some("wlan0"));
        assert_eq!(resolve_wifi_interface(&doc, Some(" ")).as_deref(), Some("wlp3s0"));
        assert_eq!(resolve_wifi_interface(&doc, None).as_deref(), Some("wlp3s0"));
        assert_eq!(resolve_wifi_interface(&NetworkDocument::default(), None), None);
    }

    #[test]
    fn test_normalize_addresses() {
        let input = vec![
            "192.168.1.21".to_string(),
            "10.0.0.5/16".to_string(),
            " ".to_string(),
            " 172.16.0.1 ".to_string(),
        ];
        assert_eq!(
            normalize_addresses(&input),
            vec!["192.168.1.21/24", "10.0.0.5/16", "172.16.0.1/24"]
        );
    }

    #[test]
    fn test_request_field_names() {
        let plan: EthernetPlan = serde_json::from_str(
            r#"{"mac":"AA:BB:CC:DD:EE:01","dhcp":false,"gateway":"","addresses":[],
                "nameservers":[],"deleteEth":true}"#,
        )
        .unwrap();
        assert!(plan.delete);

        let update: WifiUpdate = serde_json::from_str(
            r#"{"ssid":"home","ssidPassword":"pw","interface":"wlan0",
                "staticAddress":"192.168.1.21","nameservers":["8.8.8.8"]}"#,
        )
        .unwrap();
        assert_eq!(update.password, "pw");
        assert_eq!(update.addresses(), vec!["192.168.1.21"]);
        assert!(update.gateway.is_empty());
    }
}
