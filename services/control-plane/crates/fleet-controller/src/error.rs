//! Typed errors surfaced by every control-plane operation.
//!
//! The HTTP adapter maps [`ErrorKind`] to a status code; nothing below the
//! adapter knows about transports.

use std::fmt;

use fleet_common::{NodeId, NodeType};
use thiserror::Error;

pub type Result<T, E = ControllerError> = std::result::Result<T, E>;

/// Coarse error category the caller signals to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Authentication,
    Validation,
    Internal,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0} not found")]
    NotFound(Missing),

    #[error("authentication failed: {0}")]
    Authentication(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::NotFound(_) => ErrorKind::NotFound,
            ControllerError::Authentication(_) => ErrorKind::Authentication,
            ControllerError::Validation(_) => ErrorKind::Validation,
            ControllerError::Store(_) | ControllerError::Io(_) => ErrorKind::Internal,
        }
    }
}

impl From<Missing> for ControllerError {
    fn from(missing: Missing) -> Self {
        ControllerError::NotFound(missing)
    }
}

/// The entity a [`ControllerError::NotFound`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// Never carries the key value: it is a secret.
    ProvisionKey,
    Node(NodeId),
    ChangeRecord(NodeId),
    VersionCommand(NodeId),
    PendingSnapshot(NodeId),
    Workload(String),
    CatalogItem(u64),
    Registry(u64),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::ProvisionKey => f.write_str("provisioning key"),
            Missing::Node(id) => write!(f, "node {id}"),
            Missing::ChangeRecord(id) => write!(f, "change tracking for node {id}"),
            Missing::VersionCommand(id) => write!(f, "version command for node {id}"),
            Missing::PendingSnapshot(id) => write!(f, "pending image snapshot for node {id}"),
            Missing::Workload(id) => write!(f, "microservice {id}"),
            Missing::CatalogItem(id) => write!(f, "catalog item {id}"),
            Missing::Registry(id) => write!(f, "registry {id}"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// Every assigned workload lacking an artifact for `node_type`, by name.
    #[error(
        "node type {node_type} is not supported by microservice(s): {}",
        .workloads.join(", ")
    )]
    IncompatibleWorkloads {
        node_type: NodeType,
        workloads: Vec<String>,
    },

    #[error("invalid {field}: {reason}")]
    Field { field: &'static str, reason: String },

    #[error("more than one artifact variant for node type {node_type}")]
    DuplicateArtifactVariant { node_type: NodeType },

    #[error("upload rejected: {0}")]
    Upload(String),
}

impl ValidationError {
    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Field {
            field,
            reason: reason.into(),
        }
    }

    /// Offending entity names, for aggregated failures.
    #[must_use]
    pub fn details(&self) -> &[String] {
        match self {
            ValidationError::IncompatibleWorkloads { workloads, .. } => workloads,
            _ => &[],
        }
    }
}

/// Failure inside a storage adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),
}
