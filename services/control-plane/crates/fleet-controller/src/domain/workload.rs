//! Desired-state records: workloads, catalog items and their per-type artifacts,
//! registries, and the rules that resolve them against a node's type.

use std::collections::BTreeMap;

use fleet_api_types::{MicroserviceDescriptor, PortMapping, RegistryDescriptor, VolumeMapping};
use fleet_common::{ImageSnapshot, NodeId, NodeType, VersionCommandKind};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A unit of work assigned to one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct Workload {
    pub id: String,
    pub name: String,
    pub node_id: NodeId,
    pub catalog_item_id: u64,
    /// Opaque configuration handed to the running workload
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub need_update: bool,
    #[serde(default)]
    pub rebuild: bool,
    #[serde(default)]
    pub root_host_access: bool,
    #[serde(default)]
    pub log_size: u64,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub volumes: Vec<VolumeMapping>,
    #[serde(default)]
    pub delete_with_clean_up: bool,
    #[serde(default)]
    pub image_snapshot: ImageSnapshot,
    /// Whether the agent should trace this workload's syscalls
    #[serde(default)]
    pub strace_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVariant {
    pub node_type: NodeType,
    pub image: String,
}

/// Artifacts of a catalog item keyed by node type; at most one per type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Vec<ArtifactVariant>", into = "Vec<ArtifactVariant>")]
pub struct ArtifactVariants(BTreeMap<NodeType, String>);

impl ArtifactVariants {
    /// Rejects lists naming the same node type twice, so lookup never depends on order.
    pub fn new(
        variants: impl IntoIterator<Item = ArtifactVariant>,
    ) -> Result<Self, ValidationError> {
        let mut map = BTreeMap::new();
        for variant in variants {
            if map.insert(variant.node_type, variant.image).is_some() {
                return Err(ValidationError::DuplicateArtifactVariant {
                    node_type: variant.node_type,
                });
            }
        }
        Ok(Self(map))
    }

    #[must_use]
    pub fn for_type(&self, node_type: NodeType) -> Option<&str> {
        self.0.get(&node_type).map(String::as_str)
    }
}

impl TryFrom<Vec<ArtifactVariant>> for ArtifactVariants {
    type Error = ValidationError;

    fn try_from(value: Vec<ArtifactVariant>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactVariants> for Vec<ArtifactVariant> {
    fn from(value: ArtifactVariants) -> Self {
        value
            .0
            .into_iter()
            .map(|(node_type, image)| ArtifactVariant { node_type, image })
            .collect()
    }
}

/// Logical workload definition with one artifact per node type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: u64,
    pub name: String,
    pub registry_id: u64,
    pub variants: ArtifactVariants,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    pub id: u64,
    pub url: String,
    /// Account owning a private registry
    pub owner: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub requires_cert: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub user_email: String,
}

impl Registry {
    /// Public registries are visible to everyone; private ones to their owner.
    #[must_use]
    pub fn visible_to(&self, owner: &str) -> bool {
        self.is_public || self.owner == owner
    }
}

impl From<&Registry> for RegistryDescriptor {
    fn from(registry: &Registry) -> Self {
        Self {
            id: registry.id,
            url: registry.url.clone(),
            is_public: registry.is_public,
            secure: registry.secure,
            certificate: registry.certificate.clone(),
            requires_cert: registry.requires_cert,
            username: registry.username.clone(),
            password: registry.password.clone(),
            user_email: registry.user_email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionCommand {
    pub node_id: NodeId,
    pub command: VersionCommandKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryKind {
    Hardware,
    Usb,
}

/// A workload joined with its catalog item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedWorkload {
    pub workload: Workload,
    pub catalog_item: CatalogItem,
}

impl AssignedWorkload {
    #[must_use]
    pub fn artifact_for(&self, node_type: NodeType) -> Option<&str> {
        self.catalog_item.variants.for_type(node_type)
    }
}

/// Fails with every workload that has no artifact for `node_type`, by name.
pub fn check_compatibility(
    assigned: &[AssignedWorkload],
    node_type: NodeType,
) -> Result<(), ValidationError> {
    let workloads: Vec<String> = assigned
        .iter()
        .filter(|a| a.artifact_for(node_type).is_none())
        .map(|a| a.workload.name.clone())
        .collect();
    if workloads.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::IncompatibleWorkloads {
            node_type,
            workloads,
        })
    }
}

/// Build the agent-facing descriptor. An unmatched artifact resolves to `""`.
#[must_use]
pub fn describe(
    assigned: &AssignedWorkload,
    node_type: NodeType,
    registry_url: String,
    routes: Vec<String>,
) -> MicroserviceDescriptor {
    let workload = &assigned.workload;
    MicroserviceDescriptor {
        uuid: workload.id.clone(),
        image_id: assigned
            .artifact_for(node_type)
            .unwrap_or_default()
            .to_string(),
        config: workload.config.clone(),
        need_update: workload.need_update,
        rebuild: workload.rebuild,
        root_host_access: workload.root_host_access,
        log_size: workload.log_size,
        registry_url,
        port_mappings: workload.ports.clone(),
        volume_mappings: workload.volumes.clone(),
        image_snapshot: workload.image_snapshot.clone(),
        delete_with_clean_up: workload.delete_with_clean_up,
        routes,
    }
}
