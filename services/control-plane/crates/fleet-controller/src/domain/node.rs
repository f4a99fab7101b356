//! Node record and the partial-merge rules for agent config and status.

use fleet_api_types::{AgentConfig, AgentConfigUpdate, AgentStatusUpdate};
use fleet_common::{GpsMode, NodeId, NodeType};
use serde::{Deserialize, Serialize};

/// Copies every `Some` field of `$patch` onto `$target`; evaluates to whether anything changed.
macro_rules! merge_present {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {{
        let mut changed = false;
        $(
            if let Some(value) = &$patch.$field {
                if $target.$field != *value {
                    $target.$field = value.clone();
                    changed = true;
                }
            }
        )+
        changed
    }};
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Account owning the node; private registries are scoped by it
    pub owner: String,
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub config: NodeConfig,
    #[serde(default)]
    pub status: NodeStatus,
}

impl Node {
    #[must_use]
    pub fn new(id: NodeId, name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner: owner.into(),
            node_type: NodeType::Unspecified,
            config: NodeConfig::default(),
            status: NodeStatus::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    pub network_interface: String,
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
    pub gps_mode: GpsMode,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network_interface: "dynamic".to_string(),
            docker_url: "unix:///var/run/docker.sock".to_string(),
            disk_limit: 50.0,
            disk_directory: "/var/lib/fleet-agent/".to_string(),
            memory_limit: 4096.0,
            cpu_limit: 80.0,
            log_limit: 10.0,
            log_directory: "/var/log/fleet-agent/".to_string(),
            log_file_count: 10,
            status_frequency: 10,
            change_frequency: 20,
            device_scan_frequency: 60,
            watchdog_enabled: false,
            latitude: 0.0,
            longitude: 0.0,
            gps_mode: GpsMode::Auto,
        }
    }
}

impl NodeConfig {
    /// Merge the fields present in `update`. Returns whether any value changed.
    pub fn apply(&mut self, update: &AgentConfigUpdate) -> bool {
        merge_present!(self, update;
            network_interface,
            docker_url,
            disk_limit,
            disk_directory,
            memory_limit,
            cpu_limit,
            log_limit,
            log_directory,
            log_file_count,
            status_frequency,
            change_frequency,
            device_scan_frequency,
            watchdog_enabled,
            latitude,
            longitude,
            gps_mode,
        )
    }
}

impl From<&NodeConfig> for AgentConfig {
    fn from(config: &NodeConfig) -> Self {
        Self {
            network_interface: config.network_interface.clone(),
            docker_url: config.docker_url.clone(),
            disk_limit: config.disk_limit,
            disk_directory: config.disk_directory.clone(),
            memory_limit: config.memory_limit,
            cpu_limit: config.cpu_limit,
            log_limit: config.log_limit,
            log_directory: config.log_directory.clone(),
            log_file_count: config.log_file_count,
            status_frequency: config.status_frequency,
            change_frequency: config.change_frequency,
            device_scan_frequency: config.device_scan_frequency,
            watchdog_enabled: config.watchdog_enabled,
            latitude: config.latitude,
            longitude: config.longitude,
        }
    }
}

/// Last telemetry reported by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct NodeStatus {
    pub daemon_status: String,
    pub daemon_operating_duration: u64,
    pub daemon_last_start: i64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub cpu_usage: f64,
    pub memory_violation: bool,
    pub disk_violation: bool,
    pub cpu_violation: bool,
    pub microservice_status: String,
    pub repository_count: u32,
    pub repository_status: String,
    pub system_time: i64,
    pub last_status_time: i64,
    pub ip_address: String,
    pub processed_messages: u64,
    pub microservice_message_counts: String,
    pub message_speed: f64,
    pub last_command_time: i64,
    pub tunnel_status: String,
    pub version: String,
    pub is_ready_to_upgrade: bool,
    pub is_ready_to_rollback: bool,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self {
            daemon_status: "UNKNOWN".to_string(),
            daemon_operating_duration: 0,
            daemon_last_start: 0,
            memory_usage: 0.0,
            disk_usage: 0.0,
            cpu_usage: 0.0,
            memory_violation: false,
            disk_violation: false,
            cpu_violation: false,
            microservice_status: "{}".to_string(),
            repository_count: 0,
            repository_status: "{}".to_string(),
            system_time: 0,
            last_status_time: 0,
            ip_address: "0.0.0.0".to_string(),
            processed_messages: 0,
            microservice_message_counts: "{}".to_string(),
            message_speed: 0.0,
            last_command_time: 0,
            tunnel_status: "not connected".to_string(),
            version: String::new(),
            is_ready_to_upgrade: false,
            is_ready_to_rollback: false,
        }
    }
}

impl NodeStatus {
    /// Merge the fields present in `update`. Returns whether any value changed.
    pub fn apply(&mut self, update: &AgentStatusUpdate) -> bool {
        merge_present!(self, update;
            daemon_status,
            daemon_operating_duration,
            daemon_last_start,
            memory_usage,
            disk_usage,
            cpu_usage,
            memory_violation,
            disk_violation,
            cpu_violation,
            microservice_status,
            repository_count,
            repository_status,
            system_time,
            last_status_time,
            ip_address,
            processed_messages,
            microservice_message_counts,
            message_speed,
            last_command_time,
            tunnel_status,
            version,
            is_ready_to_upgrade,
            is_ready_to_rollback,
        )
    }
}
