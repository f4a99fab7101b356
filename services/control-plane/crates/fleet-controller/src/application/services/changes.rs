//! Application service: change notification.
//!
//! Writers mark flags; the node's poll drains them. The no-lost-flag
//! guarantee lives in [`ChangeTracker::drain`].

use chrono::Utc;
use fleet_api_types::ChangesResponse;
use fleet_common::{ChangeFlag, ChangeSet, NodeId};

use crate::application::ports::ChangeTracker;
use crate::error::{Missing, Result};

/// Set every flag in `changes` on the node's record, creating it if absent.
///
/// # Errors
///
/// Returns an error if the tracking store fails.
pub async fn mark(tracker: &dyn ChangeTracker, node: &NodeId, changes: ChangeSet) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }
    tracker.mark(node, changes, None).await?;
    tracing::debug!(node_id = %node, changes = changes.bits(), "change flags set");
    Ok(())
}

/// Merge an explicit flag → value map. `false` entries are ignored: flags
/// are cleared only by a drain.
///
/// # Errors
///
/// Returns an error if the tracking store fails.
pub async fn mark_flags(
    tracker: &dyn ChangeTracker,
    node: &NodeId,
    flags: impl IntoIterator<Item = (ChangeFlag, bool)>,
) -> Result<()> {
    let changes: ChangeSet = flags
        .into_iter()
        .filter_map(|(flag, set)| set.then_some(flag))
        .collect();
    mark(tracker, node, changes).await
}

/// Set `workloadConfig`, stamped with the current time, when `changed` is true.
///
/// # Errors
///
/// Returns an error if the tracking store fails.
pub async fn mark_config_changed(
    tracker: &dyn ChangeTracker,
    node: &NodeId,
    changed: bool,
) -> Result<()> {
    if !changed {
        return Ok(());
    }
    tracker
        .mark(node, ChangeFlag::WorkloadConfig.into(), Some(Utc::now()))
        .await?;
    tracing::debug!(node_id = %node, "workload config change recorded");
    Ok(())
}

/// Return the node's pending flags and clear them in one step.
///
/// # Errors
///
/// Returns NotFound if the node never registered a change record.
pub async fn drain(tracker: &dyn ChangeTracker, node: &NodeId) -> Result<ChangesResponse> {
    let changes = tracker
        .drain(node)
        .await?
        .ok_or_else(|| Missing::ChangeRecord(node.clone()))?;
    if !changes.is_empty() {
        tracing::debug!(node_id = %node, changes = changes.bits(), "change flags drained");
    }
    Ok(changes.into())
}
