//! Port trait definitions for the Application layer.
//!
//! Ports are the contracts storage and transport adapters fulfil. This file
//! imports only from `crate::domain` and `crate::error`, never from
//! `crate::infra` or `crate::http`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fleet_api_types::TunnelDescriptor;
use fleet_common::{ChangeSet, NodeId};
use futures::stream::BoxStream;

use crate::domain::{
    AccessToken, AssignedWorkload, CatalogItem, InventoryKind, Node, ProvisionKey, Registry,
    VersionCommand, Workload,
};
use crate::error::{ControllerError, StoreError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Chunks of an uploaded binary artifact.
pub type ByteStream<'a> = BoxStream<'a, std::io::Result<Bytes>>;

// ── Record store ──────────────────────────────────────────────────────────────

/// Opens units of work over node, credential and desired-state records.
#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Start a unit of work. Units are serialisable: no other unit observes
    /// its writes before [`FleetTx::commit`], and a dropped unit leaves no trace.
    async fn begin(&self) -> StoreResult<Box<dyn FleetTx>>;
}

/// One all-or-nothing unit of work.
#[async_trait]
pub trait FleetTx: Send {
    async fn node(&mut self, id: &NodeId) -> StoreResult<Option<Node>>;
    async fn nodes(&mut self) -> StoreResult<Vec<Node>>;
    async fn put_node(&mut self, node: Node) -> StoreResult<()>;
    /// Remove a node and everything it owns: credentials, workloads, tunnel,
    /// version command, inventory and diagnostics.
    async fn delete_node(&mut self, id: &NodeId) -> StoreResult<bool>;

    async fn provision_key(&mut self, key: &str) -> StoreResult<Option<ProvisionKey>>;
    /// Store `key`, replacing any key previously issued to the same node.
    async fn put_provision_key(&mut self, key: ProvisionKey) -> StoreResult<()>;
    async fn delete_provision_key(&mut self, key: &str) -> StoreResult<bool>;

    async fn access_token(&mut self, node: &NodeId) -> StoreResult<Option<AccessToken>>;
    /// Store `token` as the node's only token.
    async fn put_access_token(&mut self, token: AccessToken) -> StoreResult<()>;

    async fn catalog_item(&mut self, id: u64) -> StoreResult<Option<CatalogItem>>;
    async fn put_catalog_item(&mut self, item: CatalogItem) -> StoreResult<()>;

    async fn registry(&mut self, id: u64) -> StoreResult<Option<Registry>>;
    async fn registries_visible_to(&mut self, owner: &str) -> StoreResult<Vec<Registry>>;
    async fn put_registry(&mut self, registry: Registry) -> StoreResult<()>;

    /// Workloads on `node` joined with their catalog items, ordered by id.
    async fn assigned_workloads(&mut self, node: &NodeId) -> StoreResult<Vec<AssignedWorkload>>;
    async fn workload(&mut self, id: &str) -> StoreResult<Option<Workload>>;
    async fn put_workload(&mut self, workload: Workload) -> StoreResult<()>;
    async fn delete_workload(&mut self, id: &str) -> StoreResult<Option<Workload>>;

    async fn tunnel(&mut self, node: &NodeId) -> StoreResult<Option<TunnelDescriptor>>;
    async fn put_tunnel(
        &mut self,
        node: &NodeId,
        tunnel: Option<TunnelDescriptor>,
    ) -> StoreResult<()>;

    async fn version_command(&mut self, node: &NodeId) -> StoreResult<Option<VersionCommand>>;
    async fn put_version_command(&mut self, command: VersionCommand) -> StoreResult<()>;

    async fn append_diagnostic(&mut self, workload: &str, buffer: String) -> StoreResult<()>;
    async fn put_inventory(
        &mut self,
        node: &NodeId,
        kind: InventoryKind,
        info: String,
    ) -> StoreResult<()>;

    /// Publish every staged write atomically.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

// ── Change tracking ───────────────────────────────────────────────────────────

/// Per-node set of pending change flags.
///
/// Implementations must make [`ChangeTracker::drain`] an atomic
/// fetch-and-clear: a flag set concurrently with a drain is either returned
/// by that drain or left set for the next one.
#[async_trait]
pub trait ChangeTracker: Send + Sync {
    /// Create an all-clear record for `node` if none exists.
    async fn register(&self, node: &NodeId) -> StoreResult<()>;
    /// OR `changes` into the node's record, creating it if absent.
    /// `config_stamp` records when workload configuration last changed.
    async fn mark(
        &self,
        node: &NodeId,
        changes: ChangeSet,
        config_stamp: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;
    /// Return the pending flags and clear them; `None` if the node has no record.
    async fn drain(&self, node: &NodeId) -> StoreResult<Option<ChangeSet>>;
    /// Delete the node's record.
    async fn forget(&self, node: &NodeId) -> StoreResult<()>;
}

// ── Routing ───────────────────────────────────────────────────────────────────

/// Resolves which workloads a workload publishes to.
#[async_trait]
pub trait RouteResolver: Send + Sync {
    async fn routes_for(&self, workload: &Workload) -> StoreResult<Vec<String>>;
}

// ── Binary artifacts ──────────────────────────────────────────────────────────

/// Durable home for uploaded image snapshots.
#[async_trait]
pub trait SnapshotArchive: Send + Sync {
    /// Write `chunks` under a private staging name, then publish it with a
    /// single rename. Returns the published path; nothing is visible there
    /// unless the whole stream was written.
    async fn publish(&self, name: &str, chunks: ByteStream<'_>) -> Result<PathBuf, ControllerError>;
    /// Remove a published archive that could not be recorded.
    async fn discard(&self, path: &Path) -> Result<(), ControllerError>;
}
