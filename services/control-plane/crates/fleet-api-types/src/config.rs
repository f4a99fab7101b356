use fleet_common::GpsMode;
use serde::{Deserialize, Serialize};

/// Node configuration as served to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub network_interface: String,
    /// Container runtime endpoint
    pub docker_url: String,
    pub disk_limit: f64,
    pub disk_directory: String,
    pub memory_limit: f64,
    pub cpu_limit: f64,
    pub log_limit: f64,
    pub log_directory: String,
    pub log_file_count: u32,
    pub status_frequency: u32,
    pub change_frequency: u32,
    pub device_scan_frequency: u32,
    pub watchdog_enabled: bool,
    pub latitude: f64,
    pub longitude: f64,
}

/// Partial configuration update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_scan_frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Update-only: never echoed by [`AgentConfig`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_mode: Option<GpsMode>,
}
