//! Application service: resolve a node's desired workloads into descriptors.
//!
//! Each workload's artifact is the catalog variant for the node's declared
//! type. A workload without a matching variant is still returned, with an
//! empty artifact id.

use fleet_api_types::{MicroserviceDescriptor, MicroserviceResponse, MicroservicesResponse};
use fleet_common::{NodeId, NodeType};

use crate::application::ports::{FleetStore, FleetTx, RouteResolver};
use crate::application::services::require_node;
use crate::domain::{AssignedWorkload, describe};
use crate::error::{Missing, Result};

/// Every workload assigned to `node`.
///
/// # Errors
///
/// Returns NotFound if the node or a referenced registry does not exist.
pub async fn workloads(
    store: &dyn FleetStore,
    routes: &dyn RouteResolver,
    node: &NodeId,
) -> Result<MicroservicesResponse> {
    let mut tx = store.begin().await?;
    let node_type = require_node(&mut *tx, node).await?.node_type;
    let assigned = tx.assigned_workloads(node).await?;
    let resolved = with_registries(&mut *tx, assigned).await?;
    drop(tx);

    let mut microservices = Vec::with_capacity(resolved.len());
    for (assigned, registry_url) in resolved {
        microservices.push(resolve(routes, &assigned, node_type, registry_url).await?);
    }
    Ok(MicroservicesResponse { microservices })
}

/// One workload assigned to `node`, resolved with the same rules as [`workloads`].
///
/// # Errors
///
/// Returns NotFound if the node, the workload (on that node) or its registry
/// does not exist.
pub async fn workload(
    store: &dyn FleetStore,
    routes: &dyn RouteResolver,
    node: &NodeId,
    workload_id: &str,
) -> Result<MicroserviceResponse> {
    let mut tx = store.begin().await?;
    let node_type = require_node(&mut *tx, node).await?.node_type;
    let assigned: Vec<_> = tx
        .assigned_workloads(node)
        .await?
        .into_iter()
        .filter(|a| a.workload.id == workload_id)
        .collect();
    if assigned.is_empty() {
        return Err(Missing::Workload(workload_id.to_string()).into());
    }
    let mut resolved = with_registries(&mut *tx, assigned).await?;
    drop(tx);

    let (assigned, registry_url) = resolved.swap_remove(0);
    let microservice = resolve(routes, &assigned, node_type, registry_url).await?;
    Ok(MicroserviceResponse { microservice })
}

async fn with_registries(
    tx: &mut dyn FleetTx,
    assigned: Vec<AssignedWorkload>,
) -> Result<Vec<(AssignedWorkload, String)>> {
    let mut out = Vec::with_capacity(assigned.len());
    for a in assigned {
        let registry_id = a.catalog_item.registry_id;
        let registry = tx
            .registry(registry_id)
            .await?
            .ok_or(Missing::Registry(registry_id))?;
        out.push((a, registry.url));
    }
    Ok(out)
}

async fn resolve(
    routes: &dyn RouteResolver,
    assigned: &AssignedWorkload,
    node_type: NodeType,
    registry_url: String,
) -> Result<MicroserviceDescriptor> {
    if assigned.artifact_for(node_type).is_none() {
        tracing::warn!(
            workload_id = %assigned.workload.id,
            catalog_item = assigned.catalog_item.id,
            node_type = %node_type,
            "no artifact variant for node type, serving empty image id"
        );
    }
    let routes = routes.routes_for(&assigned.workload).await?;
    Ok(describe(assigned, node_type, registry_url, routes))
}
