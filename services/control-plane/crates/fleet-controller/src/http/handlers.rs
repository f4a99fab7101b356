//! Agent-facing handlers. Each one extracts its inputs and delegates to a
//! service; authentication happens upstream and the node id comes from the path.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use fleet_api_types::{
    AgentConfig, AgentConfigUpdate, AgentStatusUpdate, ChangesResponse, DiagnosticReport,
    HardwareInfo, ImageSnapshotResponse, MicroserviceResponse, MicroservicesResponse,
    ProvisionRequest, ProvisionResponse, RegistriesResponse, StraceTargetsResponse, StraceUpdate,
    TunnelResponse, UsbInfo, VersionCommandResponse,
};
use fleet_common::NodeId;
use fleet_common::snapshot::UPLOAD_FIELD;
use futures::{StreamExt, TryStreamExt};

use crate::application::services::{auxiliary, changes, desired_state, provisioning, sync};
use crate::domain::InventoryKind;
use crate::error::{Result, ValidationError};
use crate::state::AppState;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn provision(
    State(state): State<AppState>,
    Json(request): Json<ProvisionRequest>,
) -> Result<Json<ProvisionResponse>> {
    let response = provisioning::provision(&*state.store, &state.policy, &request).await?;
    Ok(Json(response))
}

pub async fn deregister(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<StatusCode> {
    auxiliary::deregister(&*state.store, &*state.changes, &node).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<Json<AgentConfig>> {
    Ok(Json(sync::get_config(&*state.store, &node).await?))
}

pub async fn update_config(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
    Json(update): Json<AgentConfigUpdate>,
) -> Result<StatusCode> {
    sync::update_config(&*state.store, &node, &update).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn drain_changes(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<Json<ChangesResponse>> {
    Ok(Json(changes::drain(&*state.changes, &node).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
    Json(update): Json<AgentStatusUpdate>,
) -> Result<StatusCode> {
    sync::update_status(&*state.store, &node, &update).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn microservices(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<Json<MicroservicesResponse>> {
    let response = desired_state::workloads(&*state.store, &*state.routes, &node).await?;
    Ok(Json(response))
}

pub async fn microservice(
    State(state): State<AppState>,
    Path((node, workload_id)): Path<(NodeId, String)>,
) -> Result<Json<MicroserviceResponse>> {
    let response =
        desired_state::workload(&*state.store, &*state.routes, &node, &workload_id).await?;
    Ok(Json(response))
}

pub async fn registries(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<Json<RegistriesResponse>> {
    Ok(Json(auxiliary::registries(&*state.store, &node).await?))
}

pub async fn tunnel(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<Json<TunnelResponse>> {
    Ok(Json(auxiliary::tunnel(&*state.store, &node).await?))
}

pub async fn strace_targets(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<Json<StraceTargetsResponse>> {
    Ok(Json(auxiliary::diagnostic_targets(&*state.store, &node).await?))
}

pub async fn strace_upload(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
    Json(update): Json<StraceUpdate>,
) -> Result<Json<DiagnosticReport>> {
    Ok(Json(
        auxiliary::append_diagnostics(&*state.store, &node, &update).await?,
    ))
}

pub async fn version(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<Json<VersionCommandResponse>> {
    let response = auxiliary::version_command(&*state.store, &state.policy, &node).await?;
    Ok(Json(response))
}

pub async fn hardware_info(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
    Json(body): Json<HardwareInfo>,
) -> Result<StatusCode> {
    auxiliary::put_inventory(&*state.store, &node, InventoryKind::Hardware, body.info).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn usb_info(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
    Json(body): Json<UsbInfo>,
) -> Result<StatusCode> {
    auxiliary::put_inventory(&*state.store, &node, InventoryKind::Usb, body.info).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn image_snapshot(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
) -> Result<Json<ImageSnapshotResponse>> {
    Ok(Json(auxiliary::snapshot_request(&*state.store, &node).await?))
}

/// Streams the `upstream` multipart field straight into the archive.
pub async fn image_snapshot_upload(
    State(state): State<AppState>,
    Path(node): Path<NodeId>,
    mut multipart: Multipart,
) -> Result<Json<ImageSnapshotResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::Upload(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let upload = field.map_err(std::io::Error::other).boxed();
        let response =
            auxiliary::fulfil_snapshot(&*state.store, &*state.snapshots, &node, upload).await?;
        return Ok(Json(response));
    }
    Err(ValidationError::Upload(format!("missing multipart field `{UPLOAD_FIELD}`")).into())
}
