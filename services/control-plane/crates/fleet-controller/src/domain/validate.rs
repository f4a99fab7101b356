//! Value checks the wire schema cannot express.

use fleet_api_types::{AgentConfigUpdate, AgentStatusUpdate, ProvisionRequest};
use fleet_common::validate_workload_id;

use crate::domain::Workload;
use crate::error::ValidationError;

fn non_negative(field: &'static str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ValidationError::field(
            field,
            format!("must be a non-negative number, got {v}"),
        )),
        _ => Ok(()),
    }
}

fn within(
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ValidationError::field(
            field,
            format!("must be between {min} and {max}, got {v}"),
        )),
        _ => Ok(()),
    }
}

fn positive(field: &'static str, value: Option<u32>) -> Result<(), ValidationError> {
    match value {
        Some(0) => Err(ValidationError::field(field, "must be at least 1")),
        _ => Ok(()),
    }
}

fn not_blank(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ValidationError::field(field, "must not be blank")),
        _ => Ok(()),
    }
}

pub fn validate_provision_request(request: &ProvisionRequest) -> Result<(), ValidationError> {
    not_blank("key", Some(&request.key))?;
    if !request.node_type.is_concrete() {
        return Err(ValidationError::field(
            "type",
            "a concrete node type (1 = x86, 2 = arm) is required",
        ));
    }
    Ok(())
}

pub fn validate_config_update(update: &AgentConfigUpdate) -> Result<(), ValidationError> {
    not_blank("networkInterface", update.network_interface.as_deref())?;
    not_blank("dockerUrl", update.docker_url.as_deref())?;
    not_blank("diskDirectory", update.disk_directory.as_deref())?;
    not_blank("logDirectory", update.log_directory.as_deref())?;
    non_negative("diskLimit", update.disk_limit)?;
    non_negative("memoryLimit", update.memory_limit)?;
    within("cpuLimit", update.cpu_limit, 0.0, 100.0)?;
    non_negative("logLimit", update.log_limit)?;
    positive("logFileCount", update.log_file_count)?;
    positive("statusFrequency", update.status_frequency)?;
    positive("changeFrequency", update.change_frequency)?;
    positive("deviceScanFrequency", update.device_scan_frequency)?;
    within("latitude", update.latitude, -90.0, 90.0)?;
    within("longitude", update.longitude, -180.0, 180.0)?;
    Ok(())
}

pub fn validate_status_update(update: &AgentStatusUpdate) -> Result<(), ValidationError> {
    within("memoryUsage", update.memory_usage, 0.0, f64::MAX)?;
    within("diskUsage", update.disk_usage, 0.0, f64::MAX)?;
    within("cpuUsage", update.cpu_usage, 0.0, f64::MAX)?;
    non_negative("messageSpeed", update.message_speed)?;
    Ok(())
}

pub fn validate_workload(workload: &Workload) -> Result<(), ValidationError> {
    validate_workload_id(&workload.id).map_err(|reason| ValidationError::field("id", reason))
}
