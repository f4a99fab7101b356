use fleet_common::ImageSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub port_internal: u16,
    pub port_external: u16,
    #[serde(default)]
    pub public_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMapping {
    pub host_destination: String,
    pub container_destination: String,
    /// e.g. `"rw"` or `"ro"`
    pub access_mode: String,
}

/// Fully resolved workload as the agent runs it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct MicroserviceDescriptor {
    pub uuid: String,
    /// Artifact for the node's type; empty when the catalog item has no matching variant
    pub image_id: String,
    pub config: String,
    pub need_update: bool,
    pub rebuild: bool,
    pub root_host_access: bool,
    pub log_size: u64,
    pub registry_url: String,
    pub port_mappings: Vec<PortMapping>,
    pub volume_mappings: Vec<VolumeMapping>,
    pub image_snapshot: ImageSnapshot,
    pub delete_with_clean_up: bool,
    /// Workloads this one publishes to
    pub routes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MicroservicesResponse {
    pub microservices: Vec<MicroserviceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MicroserviceResponse {
    pub microservice: MicroserviceDescriptor,
}
