//! Application service: auxiliary agent channels.
//!
//! Diagnostics, hardware/USB inventory, tunnel, registries, version commands,
//! deregistration and image snapshots.

use std::path::Path;

use chrono::Utc;
use fleet_api_types::{
    DiagnosticReport, ImageSnapshotResponse, RegistriesResponse, RegistryDescriptor,
    StraceEntry, StraceTarget, StraceTargetsResponse, StraceUpdate, TunnelResponse,
    VersionCommandResponse,
};
use fleet_common::{ImageSnapshot, NodeId};

use crate::application::ports::{ByteStream, ChangeTracker, FleetStore, FleetTx, SnapshotArchive};
use crate::application::services::{ProvisioningPolicy, require_node};
use crate::domain::{InventoryKind, ProvisionKey, Workload};
use crate::error::{Missing, Result};

/// Load a workload only if it is assigned to `node`.
async fn node_workload(tx: &mut dyn FleetTx, node: &NodeId, id: &str) -> Result<Workload> {
    match tx.workload(id).await? {
        Some(workload) if workload.node_id == *node => Ok(workload),
        _ => Err(Missing::Workload(id.to_string()).into()),
    }
}

async fn append_one(store: &dyn FleetStore, node: &NodeId, entry: &StraceEntry) -> Result<()> {
    let mut tx = store.begin().await?;
    node_workload(&mut *tx, node, &entry.microservice_uuid).await?;
    tx.append_diagnostic(&entry.microservice_uuid, entry.buffer.clone())
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Append each diagnostic buffer to its workload.
///
/// Entries are applied independently: a failing entry is reported in
/// [`DiagnosticReport::failed`] and does not undo the entries before it.
///
/// # Errors
///
/// Returns NotFound if the node does not exist.
pub async fn append_diagnostics(
    store: &dyn FleetStore,
    node: &NodeId,
    update: &StraceUpdate,
) -> Result<DiagnosticReport> {
    {
        let mut tx = store.begin().await?;
        require_node(&mut *tx, node).await?;
    }

    let mut report = DiagnosticReport::default();
    for entry in &update.strace_data {
        match append_one(store, node, entry).await {
            Ok(()) => report.applied += 1,
            Err(err) => {
                tracing::warn!(
                    node_id = %node,
                    workload_id = %entry.microservice_uuid,
                    error = %err,
                    "diagnostic entry rejected"
                );
                report.failed.push(entry.microservice_uuid.clone());
            }
        }
    }
    Ok(report)
}

/// Workloads on the node whose syscalls should be traced.
///
/// # Errors
///
/// Returns NotFound if the node does not exist.
pub async fn diagnostic_targets(
    store: &dyn FleetStore,
    node: &NodeId,
) -> Result<StraceTargetsResponse> {
    let mut tx = store.begin().await?;
    require_node(&mut *tx, node).await?;
    let microservices = tx
        .assigned_workloads(node)
        .await?
        .into_iter()
        .filter(|a| a.workload.strace_enabled)
        .map(|a| StraceTarget {
            microservice_uuid: a.workload.id,
            strace_run: true,
        })
        .collect();
    Ok(StraceTargetsResponse { microservices })
}

/// Replace the node's hardware or USB inventory snapshot.
///
/// # Errors
///
/// Returns NotFound if the node does not exist.
pub async fn put_inventory(
    store: &dyn FleetStore,
    node: &NodeId,
    kind: InventoryKind,
    info: String,
) -> Result<()> {
    let mut tx = store.begin().await?;
    require_node(&mut *tx, node).await?;
    tx.put_inventory(node, kind, info).await?;
    tx.commit().await?;
    tracing::debug!(node_id = %node, kind = ?kind, "inventory stored");
    Ok(())
}

/// The node's tunnel descriptor, absent when none is configured.
///
/// # Errors
///
/// Returns NotFound if the node does not exist.
pub async fn tunnel(store: &dyn FleetStore, node: &NodeId) -> Result<TunnelResponse> {
    let mut tx = store.begin().await?;
    require_node(&mut *tx, node).await?;
    Ok(TunnelResponse {
        tunnel: tx.tunnel(node).await?,
    })
}

/// Registries the node may pull from: public ones and those of its owner.
///
/// # Errors
///
/// Returns NotFound if the node does not exist.
pub async fn registries(store: &dyn FleetStore, node: &NodeId) -> Result<RegistriesResponse> {
    let mut tx = store.begin().await?;
    let record = require_node(&mut *tx, node).await?;
    let registries = tx
        .registries_visible_to(&record.owner)
        .await?
        .iter()
        .map(RegistryDescriptor::from)
        .collect();
    Ok(RegistriesResponse { registries })
}

/// The pending version command with a freshly minted provisioning key.
///
/// The command stays pending; every fetch replaces the node's previous key
/// so that re-provisioning after the version change uses a valid one.
///
/// # Errors
///
/// Returns NotFound if no version command is pending for the node.
pub async fn version_command(
    store: &dyn FleetStore,
    policy: &ProvisioningPolicy,
    node: &NodeId,
) -> Result<VersionCommandResponse> {
    let mut tx = store.begin().await?;
    let command = tx
        .version_command(node)
        .await?
        .ok_or_else(|| Missing::VersionCommand(node.clone()))?;
    let key = ProvisionKey::issue(node.clone(), Utc::now(), policy.provision_key_ttl);
    let response = VersionCommandResponse {
        version_command: command.command,
        provision_key: key.key.clone(),
        expiration_time: key.expires_at,
    };
    tx.put_provision_key(key).await?;
    tx.commit().await?;
    tracing::info!(node_id = %node, command = ?command.command, "version command served");
    Ok(response)
}

/// Remove the node and everything it owns, including its change record.
///
/// # Errors
///
/// Returns NotFound if the node does not exist.
pub async fn deregister(
    store: &dyn FleetStore,
    tracker: &dyn ChangeTracker,
    node: &NodeId,
) -> Result<()> {
    let mut tx = store.begin().await?;
    if !tx.delete_node(node).await? {
        return Err(Missing::Node(node.clone()).into());
    }
    tx.commit().await?;
    tracker.forget(node).await?;
    tracing::info!(node_id = %node, "node deregistered");
    Ok(())
}

async fn pending_capture(tx: &mut dyn FleetTx, node: &NodeId) -> Result<Workload> {
    tx.assigned_workloads(node)
        .await?
        .into_iter()
        .map(|a| a.workload)
        .find(|w| w.image_snapshot.is_pending())
        .ok_or_else(|| Missing::PendingSnapshot(node.clone()).into())
}

/// The workload on the node awaiting an image capture.
///
/// # Errors
///
/// Returns NotFound if no capture is pending.
pub async fn snapshot_request(
    store: &dyn FleetStore,
    node: &NodeId,
) -> Result<ImageSnapshotResponse> {
    let mut tx = store.begin().await?;
    let workload = pending_capture(&mut *tx, node).await?;
    Ok(ImageSnapshotResponse { uuid: workload.id })
}

async fn record_capture(
    store: &dyn FleetStore,
    node: &NodeId,
    workload_id: &str,
    path: &Path,
) -> Result<()> {
    let mut tx = store.begin().await?;
    let mut workload = node_workload(&mut *tx, node, workload_id).await?;
    if !workload.image_snapshot.is_pending() {
        return Err(Missing::PendingSnapshot(node.clone()).into());
    }
    workload.image_snapshot = ImageSnapshot::Captured(path.display().to_string());
    tx.put_workload(workload).await?;
    tx.commit().await?;
    Ok(())
}

/// Publish an uploaded image and record its path on the pending workload.
///
/// The archive is written to a staging file and renamed into place only once
/// complete. If the capture is no longer pending by the time the upload
/// finishes, the published file is discarded.
///
/// # Errors
///
/// Returns NotFound if no capture is pending, Validation for an empty or
/// broken upload, and an internal error if the archive cannot be written.
pub async fn fulfil_snapshot(
    store: &dyn FleetStore,
    archive: &dyn SnapshotArchive,
    node: &NodeId,
    upload: ByteStream<'_>,
) -> Result<ImageSnapshotResponse> {
    let workload_id = {
        let mut tx = store.begin().await?;
        pending_capture(&mut *tx, node).await?.id
    };

    let path = archive
        .publish(&format!("{node}-{workload_id}"), upload)
        .await?;

    let recorded = record_capture(store, node, &workload_id, &path).await;

    if let Err(err) = recorded {
        if let Err(cleanup) = archive.discard(&path).await {
            tracing::warn!(path = %path.display(), error = %cleanup, "failed to discard snapshot");
        }
        return Err(err);
    }

    tracing::info!(
        node_id = %node,
        workload_id = %workload_id,
        path = %path.display(),
        "image snapshot captured"
    );
    Ok(ImageSnapshotResponse { uuid: workload_id })
}
