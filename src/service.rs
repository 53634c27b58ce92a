//! Request orchestration
//!
//! Every change follows the same path: take the writer lock for the target
//! document, load it fresh, merge, save, then schedule activation. Wi-Fi
//! changes additionally start a liveness probe whose result is tracked per
//! attempt. Handlers never wait for activation or the probe.

use crate::activation::{ActivationOutcome, ActivationTrigger, Activator, NetplanApply};
use crate::config::{DocumentPaths, NetplanctlConfig, ProbeSettings};
use crate::document::NetworkDocument;
use crate::error::{NetplanError, NetplanResult};
use crate::extract::{self, InterfaceSummary};
use crate::interface::{InterfaceController, InterfaceKind};
use crate::merge::{self, BridgePlan, EthernetPlan, EthernetSlot, WifiProfile, WifiUpdate};
use crate::nmcli::{DeviceStatus, NmcliController};
use crate::probe::{self, ConnectionStatus, ConnectionTracker, LivenessCheck};
use crate::station::{self, LogDirectory, StationAction, StationController};
use crate::store::DocumentStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

pub struct NetplanService {
    documents: DocumentPaths,
    store: DocumentStore,
    activation: ActivationTrigger,
    tracker: ConnectionTracker,
    liveness: Arc<dyn LivenessCheck>,
    probe: ProbeSettings,
    interfaces: InterfaceController,
    nmcli: NmcliController,
    station: StationController,
    logs: LogDirectory,
}

impl NetplanService {
    /// Build the service around the given collaborators. Starts the
    /// activation actor, so it must run inside a tokio runtime.
    pub fn new(
        config: &NetplanctlConfig,
        activator: Arc<dyn Activator>,
        liveness: Arc<dyn LivenessCheck>,
        interfaces: InterfaceController,
    ) -> Self {
        Self {
            documents: config.documents.clone(),
            store: DocumentStore::new(),
            activation: ActivationTrigger::spawn(activator),
            tracker: ConnectionTracker::new(),
            liveness,
            probe: config.probe.clone(),
            interfaces,
            nmcli: NmcliController::new(),
            station: StationController::new(Duration::from_secs(config.station.action_delay_secs)),
            logs: LogDirectory::new(&config.station.log_dir, config.station.log_mode),
        }
    }

    /// Service wired to `netplan apply`, the configured liveness check and
    /// the real `/sys/class/net`
    pub fn from_config(config: &NetplanctlConfig) -> Self {
        Self::new(
            config,
            Arc::new(NetplanApply::new(&config.activation)),
            probe::liveness_check(config.probe.method),
            InterfaceController::new(),
        )
    }

    pub fn ethernet_interfaces(&self) -> NetplanResult<BTreeMap<String, InterfaceSummary>> {
        let doc = DocumentStore::load(&self.documents.ethernet)?;
        Ok(extract::ethernet_interfaces(&doc))
    }

    pub fn wifi_interfaces(&self) -> NetplanResult<BTreeMap<String, InterfaceSummary>> {
        let doc = DocumentStore::load(&self.documents.wifi)?;
        Ok(extract::wifi_interfaces(&doc))
    }

    pub fn bridge_interfaces(&self) -> NetplanResult<BTreeMap<String, InterfaceSummary>> {
        let doc = DocumentStore::load(&self.documents.bridge)?;
        Ok(extract::bridge_interfaces(&doc))
    }

    pub async fn host_interfaces(&self) -> NetplanResult<BTreeMap<InterfaceKind, Vec<String>>> {
        self.interfaces.list_classified().await
    }

    pub async fn submit_ethernet(
        &self,
        slot: EthernetSlot,
        plan: &EthernetPlan,
    ) -> NetplanResult<()> {
        let path = &self.documents.ethernet;
        let change = |doc: NetworkDocument| merge::set_ethernet_plan(doc, slot, plan);

        if !plan.delete && self.bridge_is_separate() {
            self.store
                .update_pair(path, change, &self.documents.bridge, merge::clear_bridges)
                .await?;
        } else {
            self.store.update(path, change).await?;
        }

        info!("Ethernet plan for {} saved to {}", slot, path.display());
        self.activation.schedule_apply();
        Ok(())
    }

    pub async fn submit_bridge(&self, plan: &BridgePlan) -> NetplanResult<()> {
        let path = &self.documents.bridge;
        let change = |doc: NetworkDocument| merge::set_bridge_plan(doc, plan);

        if self.bridge_is_separate() {
            self.store
                .update_pair(path, change, &self.documents.ethernet, merge::release_bridge_members)
                .await?;
        } else {
            self.store.update(path, change).await?;
        }

        info!("Bridge plan saved to {}", path.display());
        self.activation.schedule_apply();
        Ok(())
    }

    /// First-time Wi-Fi connection on the host's first wireless interface
    pub async fn connect_wifi(&self, profile: &WifiProfile) -> NetplanResult<Uuid> {
        let attempt = self.tracker.begin(&profile.ssid).await;
        let saved = self.save_wifi_profile(profile).await;
        self.start_attempt(attempt, saved).await
    }

    /// Replace the profile of the requested (or first configured) Wi-Fi interface
    pub async fn update_wifi(&self, update: &WifiUpdate) -> NetplanResult<Uuid> {
        let attempt = self.tracker.begin(&update.ssid).await;
        let saved = self.save_wifi_update(update).await;
        self.start_attempt(attempt, saved).await
    }

    async fn save_wifi_profile(&self, profile: &WifiProfile) -> NetplanResult<String> {
        let interface = self.interfaces.first_wifi().await?;
        self.store
            .update(&self.documents.wifi, |doc| {
                merge::create_wifi_profile(doc, &interface, profile)
            })
            .await?;
        Ok(interface)
    }

    async fn save_wifi_update(&self, update: &WifiUpdate) -> NetplanResult<String> {
        let host_wifi = self.interfaces.first_wifi().await.ok();
        let mut target = None;

        self.store
            .update(&self.documents.wifi, |doc| {
                let interface = merge::resolve_wifi_interface(&doc, update.interface.as_deref())
                    .or(host_wifi)
                    .ok_or_else(no_wifi_to_update)?;
                let doc = merge::update_wifi_profile(doc, &interface, update)?;
                target = Some(interface);
                Ok(doc)
            })
            .await?;

        target.ok_or_else(no_wifi_to_update)
    }

    /// Remove every Wi-Fi profile and drop the active association
    pub async fn delete_wifi(&self) -> NetplanResult<()> {
        self.store
            .update(&self.documents.wifi, merge::delete_wifi_profile)
            .await?;
        self.activation.schedule_apply();

        if let Err(e) = self.nmcli.disconnect_wifi().await {
            warn!("Wi-Fi disconnect skipped: {}", e);
        }
        Ok(())
    }

    pub async fn wifi_status(&self) -> ConnectionStatus {
        self.tracker.status().await
    }

    pub async fn interface_status(&self, interface: &str) -> NetplanResult<String> {
        self.interfaces.operstate(interface).await
    }

    pub async fn wifi_ssids(&self) -> NetplanResult<Vec<String>> {
        self.nmcli.wifi_ssids().await
    }

    pub async fn devices(&self) -> NetplanResult<Vec<DeviceStatus>> {
        self.nmcli.device_status().await
    }

    pub async fn ip_addr_dump(&self) -> NetplanResult<String> {
        station::ip_addr_dump().await
    }

    pub fn reboot(&self) {
        self.station.schedule(StationAction::Reboot);
    }

    pub fn shutdown(&self) {
        self.station.schedule(StationAction::Shutdown);
    }

    pub async fn clear_logs(&self) -> NetplanResult<usize> {
        self.logs.clear().await
    }

    pub async fn open_log_permissions(&self) -> NetplanResult<usize> {
        self.logs.open_permissions().await
    }

    pub fn activation_events(&self) -> broadcast::Receiver<ActivationOutcome> {
        self.activation.subscribe()
    }

    /// Activate and probe a saved Wi-Fi change, or close the attempt as
    /// failed when nothing was saved.
    async fn start_attempt(
        &self,
        attempt: Uuid,
        saved: NetplanResult<String>,
    ) -> NetplanResult<Uuid> {
        let interface = match saved {
            Ok(interface) => interface,
            Err(e) => {
                self.tracker.finish(attempt, false).await;
                return Err(e);
            }
        };

        self.tracker.assign_interface(attempt, &interface).await;
        self.activation.schedule_apply();
        self.tracker
            .probe_in_background(attempt, self.liveness.clone(), interface, &self.probe);
        Ok(attempt)
    }

    /// Ethernet and bridge settings live in different files
    fn bridge_is_separate(&self) -> bool {
        self.documents.ethernet != self.documents.bridge
    }
}

fn no_wifi_to_update() -> NetplanError {
    NetplanError::InterfaceNotFound("no Wi-Fi interface to update".to_string())
}
