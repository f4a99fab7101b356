//! Application services: one module per agent-facing channel.
//!
//! Each service composes domain rules with port calls. Every multi-step
//! operation runs inside one [`FleetTx`](crate::application::ports::FleetTx);
//! change flags are marked only after that unit commits.

pub mod auxiliary;
pub mod changes;
pub mod desired_state;
pub mod operations;
pub mod provisioning;
pub mod sync;

pub use provisioning::ProvisioningPolicy;

use fleet_common::NodeId;

use crate::application::ports::FleetTx;
use crate::domain::Node;
use crate::error::{Missing, Result};

/// Load a node inside `tx` or fail with NotFound.
pub(crate) async fn require_node(tx: &mut dyn FleetTx, id: &NodeId) -> Result<Node> {
    tx.node(id)
        .await?
        .ok_or_else(|| Missing::Node(id.clone()).into())
}
