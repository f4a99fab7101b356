//! Application service: agent config and status sync.
//!
//! Both updates are partial merges: fields absent from the request keep
//! their stored value. Neither touches change flags.

use fleet_api_types::{AgentConfig, AgentConfigUpdate, AgentStatusUpdate};
use fleet_common::NodeId;

use crate::application::ports::FleetStore;
use crate::application::services::require_node;
use crate::domain::validate::{validate_config_update, validate_status_update};
use crate::error::Result;

/// # Errors
///
/// Returns NotFound if the node does not exist.
pub async fn get_config(store: &dyn FleetStore, node: &NodeId) -> Result<AgentConfig> {
    let mut tx = store.begin().await?;
    let node = require_node(&mut *tx, node).await?;
    Ok(AgentConfig::from(&node.config))
}

/// Merge `update` into the node's configuration. Returns whether any stored
/// value changed.
///
/// # Errors
///
/// Returns Validation for out-of-range values and NotFound if the node does
/// not exist.
pub async fn update_config(
    store: &dyn FleetStore,
    node: &NodeId,
    update: &AgentConfigUpdate,
) -> Result<bool> {
    validate_config_update(update)?;
    let mut tx = store.begin().await?;
    let mut record = require_node(&mut *tx, node).await?;
    let changed = record.config.apply(update);
    if changed {
        tx.put_node(record).await?;
        tx.commit().await?;
        tracing::info!(node_id = %node, "node config updated");
    }
    Ok(changed)
}

/// Merge reported telemetry into the node's status.
///
/// # Errors
///
/// Returns Validation for negative usage figures and NotFound if the node
/// does not exist.
pub async fn update_status(
    store: &dyn FleetStore,
    node: &NodeId,
    update: &AgentStatusUpdate,
) -> Result<()> {
    validate_status_update(update)?;
    let mut tx = store.begin().await?;
    let mut record = require_node(&mut *tx, node).await?;
    if record.status.apply(update) {
        tx.put_node(record).await?;
        tx.commit().await?;
        tracing::debug!(node_id = %node, "node status updated");
    }
    Ok(())
}
