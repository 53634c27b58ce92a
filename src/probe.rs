//! Wi-Fi connection liveness polling
//!
//! After a Wi-Fi change is saved and activation is scheduled, a background
//! probe polls the interface until it reports an association or the attempt
//! budget runs out. The result lands in a [`ConnectionTracker`] keyed by an
//! attempt id, so a slow probe from an earlier request can never overwrite
//! the status of a newer one.

use crate::command;
use crate::config::{ProbeMethod, ProbeSettings};
use crate::nmcli;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reports whether a wireless interface is associated
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    async fn is_connected(&self, interface: &str) -> bool;
}

/// `iwgetid <iface>` exits 0 only while associated
pub struct IwgetidCheck;

#[async_trait]
impl LivenessCheck for IwgetidCheck {
    async fn is_connected(&self, interface: &str) -> bool {
        command::succeeds("iwgetid", &[interface]).await
    }
}

/// NetworkManager's view: an in-use network on the interface
pub struct NmcliCheck;

#[async_trait]
impl LivenessCheck for NmcliCheck {
    async fn is_connected(&self, interface: &str) -> bool {
        let args = ["-t", "-f", "IN-USE,SSID", "dev", "wifi", "list", "ifname", interface];
        match command::run("nmcli", &args).await {
            Ok(output) => nmcli::parse_in_use(&output),
            Err(e) => {
                debug!("nmcli liveness check failed: {}", e);
                false
            }
        }
    }
}

pub fn liveness_check(method: ProbeMethod) -> Arc<dyn LivenessCheck> {
    match method {
        ProbeMethod::Iwgetid => Arc::new(IwgetidCheck),
        ProbeMethod::Nmcli => Arc::new(NmcliCheck),
    }
}

/// Poll `check` up to `max_attempts` times, `interval` apart.
pub async fn await_connection(
    check: &dyn LivenessCheck,
    interface: &str,
    max_attempts: u32,
    interval: Duration,
) -> bool {
    for attempt in 1..=max_attempts {
        if check.is_connected(interface).await {
            info!("{} connected after {} attempt(s)", interface, attempt);
            return true;
        }
        debug!("{} not connected yet ({}/{})", interface, attempt, max_attempts);
        if attempt < max_attempts {
            sleep(interval).await;
        }
    }
    warn!("{} did not connect after {} attempts", interface, max_attempts);
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptState {
    Pending,
    Connected,
    Failed,
}

/// One Wi-Fi connect or update request and how it ended
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionAttempt {
    pub id: Uuid,
    /// Known once the request has picked its wireless interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub ssid: String,
    pub state: AttemptState,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Answer to "is Wi-Fi connected?"
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<ConnectionAttempt>,
}

/// Latest Wi-Fi connection attempt
#[derive(Clone, Default)]
pub struct ConnectionTracker {
    current: Arc<RwLock<Option<ConnectionAttempt>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new attempt. Any earlier attempt stops being current and the
    /// status reads as not connected until this one finishes.
    pub async fn begin(&self, ssid: &str) -> Uuid {
        let id = Uuid::new_v4();
        *self.current.write().await = Some(ConnectionAttempt {
            id,
            interface: None,
            ssid: ssid.to_string(),
            state: AttemptState::Pending,
            started_at: Utc::now(),
            finished_at: None,
        });
        id
    }

    pub async fn assign_interface(&self, id: Uuid, interface: &str) {
        if let Some(attempt) = self.current.write().await.as_mut().filter(|a| a.id == id) {
            attempt.interface = Some(interface.to_string());
        }
    }

    /// Record the outcome of attempt `id`. Returns false when a newer
    /// attempt has taken its place.
    pub async fn finish(&self, id: Uuid, connected: bool) -> bool {
        let mut current = self.current.write().await;
        match current.as_mut() {
            Some(attempt) if attempt.id == id => {
                attempt.state = if connected {
                    AttemptState::Connected
                } else {
                    AttemptState::Failed
                };
                attempt.finished_at = Some(Utc::now());
                true
            }
            _ => {
                debug!("Attempt {} superseded, result discarded", id);
                false
            }
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        let attempt = self.current.read().await.clone();
        ConnectionStatus {
            connected: attempt
                .as_ref()
                .is_some_and(|a| a.state == AttemptState::Connected),
            attempt,
        }
    }

    /// Poll in the background and record the outcome for attempt `id`.
    pub fn probe_in_background(
        &self,
        id: Uuid,
        check: Arc<dyn LivenessCheck>,
        interface: String,
        settings: &ProbeSettings,
    ) -> JoinHandle<bool> {
        let tracker = self.clone();
        let max_attempts = settings.max_attempts;
        let interval = settings.interval();

        tokio::spawn(async move {
            let connected =
                await_connection(check.as_ref(), &interface, max_attempts, interval).await;
            tracker.finish(id, connected).await;
            connected
        })
    }
}
