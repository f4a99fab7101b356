//! Application service: desired-state write paths.
//!
//! Every mutation of tracked state commits first and then marks the flag of
//! the affected category on every affected node, so an agent polling after
//! the write always learns about it.

use std::collections::BTreeSet;

use chrono::Utc;
use fleet_api_types::{AgentConfigUpdate, TunnelDescriptor};
use fleet_common::{ChangeFlag, ImageSnapshot, NodeId, VersionCommandKind};

use crate::application::ports::{ChangeTracker, FleetStore, FleetTx};
use crate::application::services::{ProvisioningPolicy, changes, require_node, sync};
use crate::domain::validate::validate_workload;
use crate::domain::{
    AssignedWorkload, CatalogItem, Node, ProvisionKey, Registry, VersionCommand, Workload,
    check_compatibility,
};
use crate::error::{Missing, Result, ValidationError};

/// Operator-side mutations of the fleet.
#[derive(Clone, Copy)]
pub struct FleetOperations<'a> {
    store: &'a dyn FleetStore,
    changes: &'a dyn ChangeTracker,
    policy: ProvisioningPolicy,
}

impl<'a> FleetOperations<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn FleetStore,
        changes: &'a dyn ChangeTracker,
        policy: ProvisioningPolicy,
    ) -> Self {
        Self {
            store,
            changes,
            policy,
        }
    }

    async fn mark_each(
        &self,
        nodes: impl IntoIterator<Item = NodeId>,
        flag: ChangeFlag,
    ) -> Result<()> {
        for node in nodes {
            changes::mark(self.changes, &node, flag.into()).await?;
        }
        Ok(())
    }

    /// Add a node with an empty change record and its first provisioning key.
    ///
    /// # Errors
    ///
    /// Returns Validation if a node with the same id exists.
    pub async fn register_node(&self, node: Node) -> Result<ProvisionKey> {
        let mut tx = self.store.begin().await?;
        if tx.node(&node.id).await?.is_some() {
            let reason = format!("node {} already exists", node.id);
            return Err(ValidationError::field("id", reason).into());
        }
        let key = ProvisionKey::issue(node.id.clone(), Utc::now(), self.policy.provision_key_ttl);
        let node_id = node.id.clone();
        tx.put_node(node).await?;
        tx.put_provision_key(key.clone()).await?;
        tx.commit().await?;

        self.changes.register(&node_id).await?;
        tracing::info!(node_id = %node_id, "node registered");
        Ok(key)
    }

    /// Mint a provisioning key for an existing node, replacing its previous one.
    ///
    /// # Errors
    ///
    /// Returns NotFound if the node does not exist.
    pub async fn issue_provision_key(&self, node: &NodeId) -> Result<ProvisionKey> {
        let mut tx = self.store.begin().await?;
        require_node(&mut *tx, node).await?;
        let key = ProvisionKey::issue(node.clone(), Utc::now(), self.policy.provision_key_ttl);
        tx.put_provision_key(key.clone()).await?;
        tx.commit().await?;
        tracing::info!(node_id = %node, "provisioning key issued");
        Ok(key)
    }

    /// Store a catalog item. Nodes running one of its workloads re-fetch
    /// their workload list.
    ///
    /// # Errors
    ///
    /// - NotFound if the item's registry does not exist
    /// - Validation if a provisioned node running the item would be left
    ///   without an artifact for its type
    pub async fn put_catalog_item(&self, item: CatalogItem) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if tx.registry(item.registry_id).await?.is_none() {
            return Err(Missing::Registry(item.registry_id).into());
        }
        let running = nodes_running(&mut *tx, item.id).await?;
        for (node, workloads) in &running {
            if !node.node_type.is_concrete() {
                continue;
            }
            let updated: Vec<AssignedWorkload> = workloads
                .iter()
                .map(|workload| AssignedWorkload {
                    workload: workload.clone(),
                    catalog_item: item.clone(),
                })
                .collect();
            check_compatibility(&updated, node.node_type)?;
        }
        let affected: BTreeSet<NodeId> = running.into_iter().map(|(node, _)| node.id).collect();
        let item_id = item.id;
        tx.put_catalog_item(item).await?;
        tx.commit().await?;

        self.mark_each(affected, ChangeFlag::WorkloadList).await?;
        tracing::info!(catalog_item = item_id, "catalog item stored");
        Ok(())
    }

    /// Store a registry. Nodes that can see it re-fetch their registries.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn put_registry(&self, registry: Registry) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let affected: Vec<NodeId> = tx
            .nodes()
            .await?
            .into_iter()
            .filter(|n| registry.visible_to(&n.owner))
            .map(|n| n.id)
            .collect();
        let registry_id = registry.id;
        tx.put_registry(registry).await?;
        tx.commit().await?;

        self.mark_each(affected, ChangeFlag::Registries).await?;
        tracing::info!(registry_id, "registry stored");
        Ok(())
    }

    /// Assign (or reassign) a workload to its node.
    ///
    /// # Errors
    ///
    /// - NotFound if the node or catalog item does not exist
    /// - Validation if the workload id is not a safe path segment, or the
    ///   catalog item has no artifact for a provisioned node's type
    pub async fn assign_workload(&self, workload: Workload) -> Result<()> {
        validate_workload(&workload)?;
        let mut tx = self.store.begin().await?;
        let node = require_node(&mut *tx, &workload.node_id).await?;
        let catalog_item = tx
            .catalog_item(workload.catalog_item_id)
            .await?
            .ok_or(Missing::CatalogItem(workload.catalog_item_id))?;
        let previous = tx.workload(&workload.id).await?.map(|w| w.node_id);
        let assigned = AssignedWorkload {
            workload,
            catalog_item,
        };
        if node.node_type.is_concrete() {
            check_compatibility(std::slice::from_ref(&assigned), node.node_type)?;
        }
        let workload_id = assigned.workload.id.clone();
        tx.put_workload(assigned.workload).await?;
        tx.commit().await?;

        let affected: BTreeSet<NodeId> = previous.into_iter().chain([node.id.clone()]).collect();
        self.mark_each(affected, ChangeFlag::WorkloadList).await?;
        tracing::info!(node_id = %node.id, workload_id = %workload_id, "workload assigned");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns NotFound if the workload does not exist.
    pub async fn remove_workload(&self, workload_id: &str) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let removed = tx
            .delete_workload(workload_id)
            .await?
            .ok_or_else(|| Missing::Workload(workload_id.to_string()))?;
        tx.commit().await?;

        changes::mark(self.changes, &removed.node_id, ChangeFlag::WorkloadList.into()).await?;
        tracing::info!(node_id = %removed.node_id, workload_id, "workload removed");
        Ok(())
    }

    /// Replace a workload's configuration. The node is told only if the value
    /// actually changed.
    ///
    /// # Errors
    ///
    /// Returns NotFound if the workload does not exist.
    pub async fn update_workload_config(&self, workload_id: &str, config: String) -> Result<bool> {
        let (node, changed) = self
            .edit_workload(workload_id, |w| {
                let changed = w.config != config;
                w.config = config;
                changed
            })
            .await?;
        changes::mark_config_changed(self.changes, &node, changed).await?;
        if changed {
            tracing::info!(node_id = %node, workload_id, "workload config updated");
        }
        Ok(changed)
    }

    /// Ask the workload's node to capture and upload an image of it.
    ///
    /// # Errors
    ///
    /// Returns NotFound if the workload does not exist.
    pub async fn request_image_snapshot(&self, workload_id: &str) -> Result<()> {
        let (node, _) = self
            .edit_workload(workload_id, |w| {
                w.image_snapshot = ImageSnapshot::PendingCapture;
                true
            })
            .await?;
        changes::mark(self.changes, &node, ChangeFlag::ImageSnapshot.into()).await?;
        tracing::info!(node_id = %node, workload_id, "image snapshot requested");
        Ok(())
    }

    /// Turn syscall tracing of a workload on or off.
    ///
    /// # Errors
    ///
    /// Returns NotFound if the workload does not exist.
    pub async fn set_diagnostics(&self, workload_id: &str, enabled: bool) -> Result<()> {
        let (node, changed) = self
            .edit_workload(workload_id, |w| {
                let changed = w.strace_enabled != enabled;
                w.strace_enabled = enabled;
                changed
            })
            .await?;
        if changed {
            changes::mark(self.changes, &node, ChangeFlag::Diagnostics.into()).await?;
            tracing::info!(node_id = %node, workload_id, enabled, "diagnostics toggled");
        }
        Ok(())
    }

    async fn edit_workload(
        &self,
        workload_id: &str,
        edit: impl FnOnce(&mut Workload) -> bool + Send,
    ) -> Result<(NodeId, bool)> {
        let mut tx = self.store.begin().await?;
        let mut workload = tx
            .workload(workload_id)
            .await?
            .ok_or_else(|| Missing::Workload(workload_id.to_string()))?;
        let changed = edit(&mut workload);
        let node = workload.node_id.clone();
        if changed {
            tx.put_workload(workload).await?;
            tx.commit().await?;
        }
        Ok((node, changed))
    }

    /// # Errors
    ///
    /// Returns NotFound if the node does not exist.
    pub async fn issue_version_command(
        &self,
        node: &NodeId,
        command: VersionCommandKind,
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;
        require_node(&mut *tx, node).await?;
        tx.put_version_command(VersionCommand {
            node_id: node.clone(),
            command,
        })
        .await?;
        tx.commit().await?;

        changes::mark(self.changes, node, ChangeFlag::Version.into()).await?;
        tracing::info!(node_id = %node, command = ?command, "version command issued");
        Ok(())
    }

    /// Configure or clear the node's tunnel.
    ///
    /// # Errors
    ///
    /// Returns NotFound if the node does not exist.
    pub async fn set_tunnel(&self, node: &NodeId, tunnel: Option<TunnelDescriptor>) -> Result<()> {
        let mut tx = self.store.begin().await?;
        require_node(&mut *tx, node).await?;
        tx.put_tunnel(node, tunnel).await?;
        tx.commit().await?;

        changes::mark(self.changes, node, ChangeFlag::Proxy.into()).await?;
        tracing::info!(node_id = %node, "tunnel updated");
        Ok(())
    }

    /// Operator edit of the node's configuration.
    ///
    /// # Errors
    ///
    /// Returns Validation for out-of-range values and NotFound if the node
    /// does not exist.
    pub async fn update_node_config(
        &self,
        node: &NodeId,
        update: &AgentConfigUpdate,
    ) -> Result<bool> {
        let changed = sync::update_config(self.store, node, update).await?;
        if changed {
            changes::mark(self.changes, node, ChangeFlag::Config.into()).await?;
        }
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns NotFound if the node does not exist.
    pub async fn request_reboot(&self, node: &NodeId) -> Result<()> {
        self.signal(node, ChangeFlag::Reboot).await?;
        tracing::info!(node_id = %node, "reboot requested");
        Ok(())
    }

    /// Ask the agent to remove itself; the agent answers with a deregistration.
    ///
    /// # Errors
    ///
    /// Returns NotFound if the node does not exist.
    pub async fn request_node_deletion(&self, node: &NodeId) -> Result<()> {
        self.signal(node, ChangeFlag::DeleteNode).await?;
        tracing::info!(node_id = %node, "node deletion requested");
        Ok(())
    }

    /// Tell nodes whose workload topology changed to re-fetch their routes.
    ///
    /// # Errors
    ///
    /// Returns NotFound if a node does not exist.
    pub async fn announce_routing_change(&self, nodes: &[NodeId]) -> Result<()> {
        for node in nodes {
            self.signal(node, ChangeFlag::Routing).await?;
        }
        Ok(())
    }

    async fn signal(&self, node: &NodeId, flag: ChangeFlag) -> Result<()> {
        {
            let mut tx = self.store.begin().await?;
            require_node(&mut *tx, node).await?;
        }
        changes::mark(self.changes, node, flag.into()).await
    }
}

/// Nodes with at least one workload built from `catalog_item`, each with
/// those workloads.
async fn nodes_running(
    tx: &mut dyn FleetTx,
    catalog_item: u64,
) -> Result<Vec<(Node, Vec<Workload>)>> {
    let mut running = Vec::new();
    for node in tx.nodes().await? {
        let workloads: Vec<Workload> = tx
            .assigned_workloads(&node.id)
            .await?
            .into_iter()
            .filter(|a| a.catalog_item.id == catalog_item)
            .map(|a| a.workload)
            .collect();
        if !workloads.is_empty() {
            running.push((node, workloads));
        }
    }
    Ok(running)
}
