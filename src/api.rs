//! HTTP API
//!
//! JSON over axum. Mutating endpoints answer `{"response": "OK"}` once the
//! document is saved; activation happens afterwards in the background.

use crate::error::NetplanError;
use crate::extract::InterfaceSummary;
use crate::interface::InterfaceKind;
use crate::merge::{BridgePlan, EthernetPlan, EthernetSlot, WifiProfile, WifiUpdate};
use crate::nmcli::DeviceStatus;
use crate::probe::ConnectionStatus;
use crate::service::NetplanService;
use crate::validation::sanitize_error_message;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NetplanService>,
}

impl AppState {
    pub fn new(service: NetplanService) -> Self {
        Self { service: Arc::new(service) }
    }
}

/// API error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    details: Option<String>,
}

/// Wrapper for API errors to implement IntoResponse
pub struct ApiError(NetplanError);

impl From<NetplanError> for ApiError {
    fn from(err: NetplanError) -> Self {
        ApiError(err)
    }
}

/// Every failure of the core is a server error; the body says which one.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let details = match &self.0 {
            NetplanError::MalformedDocument { path, .. }
            | NetplanError::ReadFailed { path, .. }
            | NetplanError::WriteFailed { path, .. } => Some(path.display().to_string()),
            NetplanError::CommandFailed { cmd, .. } => Some(cmd.clone()),
            _ => None,
        };

        error!("Request failed: {}", self.0);

        let body = Json(ErrorResponse {
            error: sanitize_error_message(&self.0.to_string()),
            details,
        });

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn ok() -> Json<Value> {
    Json(json!({ "response": "OK" }))
}

#[derive(Debug, Serialize)]
struct ConnectingResponse {
    response: &'static str,
    attempt: Uuid,
}

impl ConnectingResponse {
    fn new(attempt: Uuid) -> Json<Self> {
        Json(Self { response: "connecting", attempt })
    }
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "netplanctld",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============================================================================
// Configured interfaces
// ============================================================================

type Summaries = BTreeMap<String, InterfaceSummary>;

async fn ethernet_interfaces(State(state): State<AppState>) -> ApiResult<Summaries> {
    Ok(Json(state.service.ethernet_interfaces()?))
}

async fn wifi_interfaces(State(state): State<AppState>) -> ApiResult<Summaries> {
    Ok(Json(state.service.wifi_interfaces()?))
}

async fn bridge_interfaces(State(state): State<AppState>) -> ApiResult<Summaries> {
    Ok(Json(state.service.bridge_interfaces()?))
}

type HostInterfaces = BTreeMap<InterfaceKind, Vec<String>>;

async fn host_interfaces(State(state): State<AppState>) -> ApiResult<HostInterfaces> {
    Ok(Json(state.service.host_interfaces().await?))
}

// ============================================================================
// Ethernet and bridge
// ============================================================================

async fn submit_ethernet(
    State(state): State<AppState>,
    Path(slot): Path<String>,
    Json(plan): Json<EthernetPlan>,
) -> ApiResult<Value> {
    let slot: EthernetSlot = slot.parse()?;
    info!("Ethernet plan for {} (dhcp={}, delete={})", slot, plan.dhcp, plan.delete);
    state.service.submit_ethernet(slot, &plan).await?;
    Ok(ok())
}

async fn submit_bridge(
    State(state): State<AppState>,
    Json(plan): Json<BridgePlan>,
) -> ApiResult<Value> {
    state.service.submit_bridge(&plan).await?;
    Ok(ok())
}

// ============================================================================
// Wi-Fi
// ============================================================================

async fn wifi_connect(
    State(state): State<AppState>,
    Json(profile): Json<WifiProfile>,
) -> ApiResult<ConnectingResponse> {
    let attempt = state.service.connect_wifi(&profile).await?;
    Ok(ConnectingResponse::new(attempt))
}

async fn wifi_update(
    State(state): State<AppState>,
    Json(update): Json<WifiUpdate>,
) -> ApiResult<ConnectingResponse> {
    let attempt = state.service.update_wifi(&update).await?;
    Ok(ConnectingResponse::new(attempt))
}

async fn wifi_delete(State(state): State<AppState>) -> ApiResult<Value> {
    state.service.delete_wifi().await?;
    Ok(ok())
}

async fn wifi_status(State(state): State<AppState>) -> Json<ConnectionStatus> {
    Json(state.service.wifi_status().await)
}

async fn wifi_ssids(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!({ "response": state.service.wifi_ssids().await? })))
}

// ============================================================================
// Host status and station control
// ============================================================================

async fn interface_status(
    State(state): State<AppState>,
    Path(interface): Path<String>,
) -> ApiResult<Value> {
    let operstate = state.service.interface_status(&interface).await?;
    Ok(Json(json!({ "response": operstate })))
}

async fn ip_addr(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!({ "response": state.service.ip_addr_dump().await? })))
}

async fn devices(State(state): State<AppState>) -> ApiResult<Vec<DeviceStatus>> {
    Ok(Json(state.service.devices().await?))
}

async fn reboot(State(state): State<AppState>) -> Json<Value> {
    state.service.reboot();
    ok()
}

async fn shutdown(State(state): State<AppState>) -> Json<Value> {
    state.service.shutdown();
    ok()
}

async fn clear_logs(State(state): State<AppState>) -> ApiResult<Value> {
    let removed = state.service.clear_logs().await?;
    Ok(Json(json!({ "response": "OK", "removed": removed })))
}

async fn log_permissions(State(state): State<AppState>) -> ApiResult<Value> {
    let changed = state.service.open_log_permissions().await?;
    Ok(Json(json!({ "response": "OK", "changed": changed })))
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Configured interfaces
        .route("/api/interfaces/ethernet", get(ethernet_interfaces))
        .route("/api/interfaces/wifi", get(wifi_interfaces))
        .route("/api/interfaces/bridge", get(bridge_interfaces))
        .route("/api/interfaces/host", get(host_interfaces))
        // Ethernet and bridge
        .route("/api/ethernet/:slot", post(submit_ethernet))
        .route("/api/bridge", post(submit_bridge))
        // Wi-Fi
        .route("/api/wifi/connect", post(wifi_connect))
        .route("/api/wifi/update", post(wifi_update))
        .route("/api/wifi/delete", post(wifi_delete))
        .route("/api/wifi/status", get(wifi_status))
        .route("/api/wifi/ssids", get(wifi_ssids))
        // Host
        .route("/api/status/:interface", get(interface_status))
        .route("/api/network/ip", get(ip_addr))
        .route("/api/network/devices", get(devices))
        .route("/api/station/reboot", post(reboot))
        .route("/api/station/shutdown", post(shutdown))
        .route("/api/station/logs/clear", post(clear_logs))
        .route("/api/station/logs/permissions", post(log_permissions))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
