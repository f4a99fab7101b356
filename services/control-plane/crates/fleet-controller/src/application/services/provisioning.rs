//! Application service: the provisioning handshake.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use chrono::{TimeDelta, Utc};
use fleet_api_types::{ProvisionRequest, ProvisionResponse};
use fleet_common::{ControllerConfig, defaults};

use crate::application::ports::FleetStore;
use crate::application::services::require_node;
use crate::domain::validate::validate_provision_request;
use crate::domain::{AccessToken, check_compatibility};
use crate::error::{ControllerError, Missing, Result, ValidationError};

/// Lifetimes of the credentials minted by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningPolicy {
    pub provision_key_ttl: TimeDelta,
    pub access_token_ttl: TimeDelta,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self {
            provision_key_ttl: ttl("provision_key_ttl_secs", defaults::PROVISION_KEY_TTL_SECS)
                .unwrap_or(TimeDelta::MAX),
            access_token_ttl: ttl("access_token_ttl_secs", defaults::ACCESS_TOKEN_TTL_SECS)
                .unwrap_or(TimeDelta::MAX),
        }
    }
}

impl ProvisioningPolicy {
    /// # Errors
    ///
    /// Returns a validation error if a configured lifetime does not fit a [`TimeDelta`].
    pub fn from_config(config: &ControllerConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            provision_key_ttl: ttl("provision_key_ttl_secs", config.provision_key_ttl_secs)?,
            access_token_ttl: ttl("access_token_ttl_secs", config.access_token_ttl_secs)?,
        })
    }
}

/// A lifetime whose expiry from now is representable.
fn ttl(field: &'static str, secs: u64) -> Result<TimeDelta, ValidationError> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| ValidationError::field(field, format!("{secs}s is out of range")))
}

/// Redeem a provisioning key for an access token.
///
/// Key lookup, the expiry check, the compatibility check, token rotation,
/// the node-type update and key consumption run in one unit of work: a
/// failure at any step leaves no trace, and a concurrent second redemption
/// of the same key observes NotFound.
///
/// # Errors
///
/// - NotFound if the key (or its node) does not exist
/// - Authentication if the key has expired
/// - Validation if the request is malformed or an assigned workload has no
///   artifact for the requested type
pub async fn provision(
    store: &dyn FleetStore,
    policy: &ProvisioningPolicy,
    request: &ProvisionRequest,
) -> Result<ProvisionResponse> {
    validate_provision_request(request)?;

    let now = Utc::now();
    let mut tx = store.begin().await?;

    let key = tx
        .provision_key(&request.key)
        .await?
        .ok_or(Missing::ProvisionKey)?;
    if key.is_expired(now) {
        return Err(ControllerError::Authentication(
            "provisioning key has expired",
        ));
    }

    let mut node = require_node(&mut *tx, &key.node_id).await?;
    let assigned = tx.assigned_workloads(&node.id).await?;
    check_compatibility(&assigned, request.node_type)?;

    let (token, value) = AccessToken::issue(node.id.clone(), now, policy.access_token_ttl);
    tx.put_access_token(token).await?;
    node.node_type = request.node_type;
    let node_id = node.id.clone();
    tx.put_node(node).await?;
    tx.delete_provision_key(&key.key).await?;
    tx.commit().await?;

    tracing::info!(node_id = %node_id, node_type = %request.node_type, "node provisioned");
    Ok(ProvisionResponse {
        node_id,
        token: value,
    })
}
