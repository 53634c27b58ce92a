//! netplanctl - netplan configuration over HTTP
//!
//! Library behind the `netplanctld` daemon:
//! - typed netplan documents with atomic, per-path serialized storage
//! - merge rules for Ethernet, bridge and Wi-Fi changes
//! - background `netplan apply` and Wi-Fi liveness probing
//! - host queries through sysfs, `nmcli` and `ip`
//! - axum router exposing all of the above

pub mod error;
pub mod validation;
pub mod config;
pub mod command;
pub mod document;
pub mod store;
pub mod extract;
pub mod merge;
pub mod activation;
pub mod probe;
pub mod interface;
pub mod nmcli;
pub mod station;
pub mod service;
pub mod api;

// Re-export commonly used types
pub use error::{NetplanError, NetplanResult};
pub use config::{DocumentPaths, NetplanctlConfig, ProbeMethod};
pub use document::NetworkDocument;
pub use store::DocumentStore;
pub use extract::InterfaceSummary;
pub use merge::{BridgePlan, EthernetPlan, EthernetSlot, WifiProfile, WifiUpdate};
pub use activation::{ActivationOutcome, ActivationTrigger, Activator, NetplanApply};
pub use probe::{ConnectionAttempt, ConnectionStatus, ConnectionTracker, LivenessCheck};
pub use interface::{InterfaceController, InterfaceKind};
pub use service::NetplanService;
pub use api::{router, AppState};
