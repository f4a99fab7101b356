//! In-process adapters: a record store and a change tracker.
//!
//! The store serialises units of work with an owned async mutex and stages
//! writes on a copy of the records, published by `commit`. The tracker keeps
//! one atomic bitmask per node.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU16, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_api_types::TunnelDescriptor;
use fleet_common::{ChangeSet, NodeId};
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::application::ports::{ChangeTracker, FleetStore, FleetTx, StoreResult};
use crate::domain::{
    AccessToken, AssignedWorkload, CatalogItem, InventoryKind, Node, ProvisionKey, Registry,
    VersionCommand, Workload,
};
use crate::error::StoreError;

/// Every record the store holds.
#[derive(Debug, Clone, Default)]
pub struct FleetRecords {
    pub nodes: BTreeMap<NodeId, Node>,
    /// Keyed by key value
    pub provision_keys: HashMap<String, ProvisionKey>,
    pub access_tokens: HashMap<NodeId, AccessToken>,
    pub catalog: BTreeMap<u64, CatalogItem>,
    pub registries: BTreeMap<u64, Registry>,
    pub workloads: BTreeMap<String, Workload>,
    pub tunnels: HashMap<NodeId, TunnelDescriptor>,
    pub version_commands: HashMap<NodeId, VersionCommand>,
    pub diagnostics: HashMap<String, Vec<String>>,
    pub inventory: HashMap<(NodeId, InventoryKind), String>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<FleetRecords>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(records: FleetRecords) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Copy of the committed records.
    pub async fn snapshot(&self) -> FleetRecords {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl FleetStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn FleetTx>> {
        let guard = Arc::clone(&self.records).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

/// Holds the store lock for its whole life; dropping it without `commit`
/// discards `staged`.
struct MemoryTx {
    guard: OwnedMutexGuard<FleetRecords>,
    staged: FleetRecords,
}

#[async_trait]
impl FleetTx for MemoryTx {
    async fn node(&mut self, id: &NodeId) -> StoreResult<Option<Node>> {
        Ok(self.staged.nodes.get(id).cloned())
    }

    async fn nodes(&mut self) -> StoreResult<Vec<Node>> {
        Ok(self.staged.nodes.values().cloned().collect())
    }

    async fn put_node(&mut self, node: Node) -> StoreResult<()> {
        self.staged.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn delete_node(&mut self, id: &NodeId) -> StoreResult<bool> {
        let records = &mut self.staged;
        if records.nodes.remove(id).is_none() {
            return Ok(false);
        }
        records.provision_keys.retain(|_, key| key.node_id != *id);
        records.access_tokens.remove(id);
        let removed: Vec<String> = records
            .workloads
            .values()
            .filter(|w| w.node_id == *id)
            .map(|w| w.id.clone())
            .collect();
        for workload in &removed {
            records.workloads.remove(workload);
            records.diagnostics.remove(workload);
        }
        records.tunnels.remove(id);
        records.version_commands.remove(id);
        records.inventory.retain(|(node, _), _| node != id);
        Ok(true)
    }

    async fn provision_key(&mut self, key: &str) -> StoreResult<Option<ProvisionKey>> {
        Ok(self.staged.provision_keys.get(key).cloned())
    }

    async fn put_provision_key(&mut self, key: ProvisionKey) -> StoreResult<()> {
        let keys = &mut self.staged.provision_keys;
        keys.retain(|_, existing| existing.node_id != key.node_id);
        keys.insert(key.key.clone(), key);
        Ok(())
    }

    async fn delete_provision_key(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.staged.provision_keys.remove(key).is_some())
    }

    async fn access_token(&mut self, node: &NodeId) -> StoreResult<Option<AccessToken>> {
        Ok(self.staged.access_tokens.get(node).cloned())
    }

    async fn put_access_token(&mut self, token: AccessToken) -> StoreResult<()> {
        self.staged
            .access_tokens
            .insert(token.node_id.clone(), token);
        Ok(())
    }

    async fn catalog_item(&mut self, id: u64) -> StoreResult<Option<CatalogItem>> {
        Ok(self.staged.catalog.get(&id).cloned())
    }

    async fn put_catalog_item(&mut self, item: CatalogItem) -> StoreResult<()> {
        self.staged.catalog.insert(item.id, item);
        Ok(())
    }

    async fn registry(&mut self, id: u64) -> StoreResult<Option<Registry>> {
        Ok(self.staged.registries.get(&id).cloned())
    }

    async fn registries_visible_to(&mut self, owner: &str) -> StoreResult<Vec<Registry>> {
        Ok(self
            .staged
            .registries
            .values()
            .filter(|r| r.visible_to(owner))
            .cloned()
            .collect())
    }

    async fn put_registry(&mut self, registry: Registry) -> StoreResult<()> {
        self.staged.registries.insert(registry.id, registry);
        Ok(())
    }

    async fn assigned_workloads(&mut self, node: &NodeId) -> StoreResult<Vec<AssignedWorkload>> {
        let records = &self.staged;
        records
            .workloads
            .values()
            .filter(|w| w.node_id == *node)
            .map(|workload| {
                let catalog_item = records
                    .catalog
                    .get(&workload.catalog_item_id)
                    .cloned()
                    .ok_or_else(|| {
                        StoreError::Backend(format!(
                            "workload {} references missing catalog item {}",
                            workload.id, workload.catalog_item_id
                        ))
                    })?;
                Ok(AssignedWorkload {
                    workload: workload.clone(),
                    catalog_item,
                })
            })
            .collect()
    }

    async fn workload(&mut self, id: &str) -> StoreResult<Option<Workload>> {
        Ok(self.staged.workloads.get(id).cloned())
    }

    async fn put_workload(&mut self, workload: Workload) -> StoreResult<()> {
        if !self.staged.catalog.contains_key(&workload.catalog_item_id) {
            return Err(StoreError::Backend(format!(
                "catalog item {} does not exist",
                workload.catalog_item_id
            )));
        }
        self.staged.workloads.insert(workload.id.clone(), workload);
        Ok(())
    }

    async fn delete_workload(&mut self, id: &str) -> StoreResult<Option<Workload>> {
        self.staged.diagnostics.remove(id);
        Ok(self.staged.workloads.remove(id))
    }

    async fn tunnel(&mut self, node: &NodeId) -> StoreResult<Option<TunnelDescriptor>> {
        Ok(self.staged.tunnels.get(node).cloned())
    }

    async fn put_tunnel(
        &mut self,
        node: &NodeId,
        tunnel: Option<TunnelDescriptor>,
    ) -> StoreResult<()> {
        match tunnel {
            Some(tunnel) => self.staged.tunnels.insert(node.clone(), tunnel),
            None => self.staged.tunnels.remove(node),
        };
        Ok(())
    }

    async fn version_command(&mut self, node: &NodeId) -> StoreResult<Option<VersionCommand>> {
        Ok(self.staged.version_commands.get(node).cloned())
    }

    async fn put_version_command(&mut self, command: VersionCommand) -> StoreResult<()> {
        self.staged
            .version_commands
            .insert(command.node_id.clone(), command);
        Ok(())
    }

    async fn append_diagnostic(&mut self, workload: &str, buffer: String) -> StoreResult<()> {
        self.staged
            .diagnostics
            .entry(workload.to_string())
            .or_default()
            .push(buffer);
        Ok(())
    }

    async fn put_inventory(
        &mut self,
        node: &NodeId,
        kind: InventoryKind,
        info: String,
    ) -> StoreResult<()> {
        self.staged.inventory.insert((node.clone(), kind), info);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

// ── Change tracking ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ChangeCell {
    flags: AtomicU16,
    /// Unix millis of the last workload config change, 0 if none
    config_stamp: AtomicI64,
}

#[derive(Debug, Default)]
pub struct MemoryChangeTracker {
    cells: RwLock<HashMap<NodeId, Arc<ChangeCell>>>,
}

impl MemoryChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, node: &NodeId) -> Arc<ChangeCell> {
        if let Some(cell) = self.cells.read().get(node) {
            return Arc::clone(cell);
        }
        Arc::clone(self.cells.write().entry(node.clone()).or_default())
    }

    /// Time of the node's last recorded workload config change.
    #[must_use]
    pub fn config_stamp(&self, node: &NodeId) -> Option<DateTime<Utc>> {
        let millis = self.cells.read().get(node)?.config_stamp.load(Ordering::Acquire);
        if millis == 0 {
            None
        } else {
            DateTime::from_timestamp_millis(millis)
        }
    }
}

#[async_trait]
impl ChangeTracker for MemoryChangeTracker {
    async fn register(&self, node: &NodeId) -> StoreResult<()> {
        self.cell(node);
        Ok(())
    }

    async fn mark(
        &self,
        node: &NodeId,
        changes: ChangeSet,
        config_stamp: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let cell = self.cell(node);
        if let Some(at) = config_stamp {
            cell.config_stamp
                .store(at.timestamp_millis(), Ordering::Release);
        }
        cell.flags.fetch_or(changes.bits(), Ordering::AcqRel);
        Ok(())
    }

    async fn drain(&self, node: &NodeId) -> StoreResult<Option<ChangeSet>> {
        let Some(cell) = self.cells.read().get(node).map(Arc::clone) else {
            return Ok(None);
        };
        let bits = cell.flags.swap(0, Ordering::AcqRel);
        Ok(Some(ChangeSet::from_bits_truncate(bits)))
    }

    async fn forget(&self, node: &NodeId) -> StoreResult<()> {
        self.cells.write().remove(node);
        Ok(())
    }
}
