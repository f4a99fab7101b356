use fleet_common::{ChangeFlag, ChangeSet};
use serde::{Deserialize, Serialize};

/// Result of a change drain: the value of every flag just before it was reset.
///
/// Field names are the protocol's; see [`ChangeFlag::wire_name`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct ChangesResponse {
    pub config: bool,
    pub version: bool,
    pub reboot: bool,
    pub delete_node: bool,
    pub microservice_list: bool,
    pub microservice_config: bool,
    pub routing: bool,
    pub registries: bool,
    pub tunnel: bool,
    pub diagnostics: bool,
    pub is_image_snapshot: bool,
}

impl From<ChangeSet> for ChangesResponse {
    fn from(set: ChangeSet) -> Self {
        Self {
            config: set.contains(ChangeFlag::Config),
            version: set.contains(ChangeFlag::Version),
            reboot: set.contains(ChangeFlag::Reboot),
            delete_node: set.contains(ChangeFlag::DeleteNode),
            microservice_list: set.contains(ChangeFlag::WorkloadList),
            microservice_config: set.contains(ChangeFlag::WorkloadConfig),
            routing: set.contains(ChangeFlag::Routing),
            registries: set.contains(ChangeFlag::Registries),
            tunnel: set.contains(ChangeFlag::Proxy),
            diagnostics: set.contains(ChangeFlag::Diagnostics),
            is_image_snapshot: set.contains(ChangeFlag::ImageSnapshot),
        }
    }
}

impl From<ChangesResponse> for ChangeSet {
    fn from(resp: ChangesResponse) -> Self {
        [
            (resp.config, ChangeFlag::Config),
            (resp.version, ChangeFlag::Version),
            (resp.reboot, ChangeFlag::Reboot),
            (resp.delete_node, ChangeFlag::DeleteNode),
            (resp.microservice_list, ChangeFlag::WorkloadList),
            (resp.microservice_config, ChangeFlag::WorkloadConfig),
            (resp.routing, ChangeFlag::Routing),
            (resp.registries, ChangeFlag::Registries),
            (resp.tunnel, ChangeFlag::Proxy),
            (resp.diagnostics, ChangeFlag::Diagnostics),
            (resp.is_image_snapshot, ChangeFlag::ImageSnapshot),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect()
    }
}
