//! Bodies of the auxiliary agent channels: registries, tunnel, diagnostics,
//! version commands, hardware inventory and image snapshots.

use chrono::{DateTime, Utc};
use fleet_common::VersionCommandKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDescriptor {
    pub id: u64,
    pub url: String,
    pub is_public: bool,
    pub secure: bool,
    pub certificate: String,
    pub requires_cert: bool,
    pub username: String,
    pub password: String,
    pub user_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistriesResponse {
    pub registries: Vec<RegistryDescriptor>,
}

/// Reverse SSH tunnel the agent should hold open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TunnelDescriptor {
    pub username: String,
    pub password: String,
    pub host: String,
    pub remote_port: u16,
    pub local_port: u16,
    pub rsa_key: String,
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TunnelResponse {
    /// `None` when no tunnel is configured for the node
    pub tunnel: Option<TunnelDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StraceEntry {
    pub microservice_uuid: String,
    pub buffer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StraceUpdate {
    pub strace_data: Vec<StraceEntry>,
}

/// Outcome of a diagnostic batch; entries are applied independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub applied: usize,
    /// Workload ids whose entry was rejected
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StraceTarget {
    pub microservice_uuid: String,
    pub strace_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StraceTargetsResponse {
    pub microservices: Vec<StraceTarget>,
}

/// Pending version change together with the key the agent re-provisions with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionCommandResponse {
    pub version_command: VersionCommandKind,
    pub provision_key: String,
    pub expiration_time: DateTime<Utc>,
}

/// Opaque hardware description reported by the agent's HAL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HardwareInfo {
    pub info: String,
}

/// Opaque USB device listing reported by the agent's HAL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsbInfo {
    pub info: String,
}

/// Workload whose image the agent should capture and upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSnapshotResponse {
    pub uuid: String,
}
