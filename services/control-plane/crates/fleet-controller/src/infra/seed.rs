//! JSON fixture loaded into the in-memory store at startup.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use fleet_api_types::TunnelDescriptor;
use fleet_common::NodeId;
use serde::Deserialize;

use crate::domain::validate::validate_workload;
use crate::domain::{CatalogItem, Node, ProvisionKey, Registry, VersionCommand, Workload};
use crate::infra::memory::FleetRecords;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedTunnel {
    pub node_id: NodeId,
    pub tunnel: TunnelDescriptor,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FleetSeed {
    pub nodes: Vec<Node>,
    pub provision_keys: Vec<ProvisionKey>,
    pub registries: Vec<Registry>,
    pub catalog: Vec<CatalogItem>,
    pub workloads: Vec<Workload>,
    pub tunnels: Vec<SeedTunnel>,
    pub version_commands: Vec<VersionCommand>,
    /// Source workload id to destination workload ids
    pub routes: HashMap<String, Vec<String>>,
}

impl FleetSeed {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse seed file: {}", path.display()))
    }

    /// Check references, then split into store records and the route table.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first dangling reference.
    pub fn into_records(self) -> Result<(FleetRecords, HashMap<String, Vec<String>>)> {
        let mut records = FleetRecords::default();
        for node in self.nodes {
            records.nodes.insert(node.id.clone(), node);
        }
        for registry in self.registries {
            records.registries.insert(registry.id, registry);
        }
        for item in self.catalog {
            ensure!(
                records.registries.contains_key(&item.registry_id),
                "catalog item {} references unknown registry {}",
                item.id,
                item.registry_id
            );
            records.catalog.insert(item.id, item);
        }
        for workload in self.workloads {
            validate_workload(&workload)
                .with_context(|| format!("invalid workload id {:?}", workload.id))?;
            ensure!(
                records.nodes.contains_key(&workload.node_id),
                "workload {} references unknown node {}",
                workload.id,
                workload.node_id
            );
            ensure!(
                records.catalog.contains_key(&workload.catalog_item_id),
                "workload {} references unknown catalog item {}",
                workload.id,
                workload.catalog_item_id
            );
            records.workloads.insert(workload.id.clone(), workload);
        }
        for key in self.provision_keys {
            ensure!(
                records.nodes.contains_key(&key.node_id),
                "provisioning key references unknown node {}",
                key.node_id
            );
            records.provision_keys.insert(key.key.clone(), key);
        }
        for SeedTunnel { node_id, tunnel } in self.tunnels {
            ensure!(
                records.nodes.contains_key(&node_id),
                "tunnel references unknown node {node_id}"
            );
            records.tunnels.insert(node_id, tunnel);
        }
        for command in self.version_commands {
            ensure!(
                records.nodes.contains_key(&command.node_id),
                "version command references unknown node {}",
                command.node_id
            );
            records.version_commands.insert(command.node_id.clone(), command);
        }
        Ok((records, self.routes))
    }
}
