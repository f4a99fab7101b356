use serde::{Deserialize, Serialize};

/// Partial status report pushed by the agent. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_operating_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_last_start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_violation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_violation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_violation: Option<bool>,
    /// JSON-encoded per-microservice status, stored verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microservice_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_messages: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microservice_message_counts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_ready_to_upgrade: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_ready_to_rollback: Option<bool>,
}
