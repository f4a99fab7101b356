//! Domain layer: records, resolution rules and validation.
//!
//! This module has no imports from `crate::application`, `crate::infra` or
//! `crate::http`, and performs no I/O.

pub mod node;
pub mod provisioning;
pub mod validate;
pub mod workload;

pub use node::{Node, NodeConfig, NodeStatus};
pub use provisioning::{AccessToken, ProvisionKey, generate_secret, token_digest};
pub use workload::{
    ArtifactVariant, ArtifactVariants, AssignedWorkload, CatalogItem, InventoryKind, Registry,
    VersionCommand, Workload, check_compatibility, describe,
};
