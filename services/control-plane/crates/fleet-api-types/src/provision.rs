use fleet_common::{NodeId, NodeType};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v3/agent/provision`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    /// Single-use provisioning key handed to the node operator
    pub key: String,
    /// Node type the agent runs on
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

/// Credential returned by a successful provisioning handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResponse {
    pub node_id: NodeId,
    /// Access token, shown once; only its digest is stored
    pub token: String,
}
