//! Provisioning secrets: single-use keys and node access tokens.
//!
//! Secrets come from the OS RNG. Access tokens are handed out once and only
//! their SHA-256 digest is persisted.

use chrono::{DateTime, TimeDelta, Utc};
use fleet_common::{NodeId, defaults};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lowercase hex encoding of `bytes` random bytes.
#[must_use]
pub fn generate_secret(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

#[must_use]
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// `now + ttl`, clamped to the latest representable instant.
#[must_use]
pub fn expiry(now: DateTime<Utc>, ttl: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Single-use key a node redeems to obtain its access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionKey {
    pub key: String,
    pub node_id: NodeId,
    pub expires_at: DateTime<Utc>,
}

impl ProvisionKey {
    #[must_use]
    pub fn issue(node_id: NodeId, now: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self {
            key: generate_secret(defaults::PROVISION_KEY_BYTES),
            node_id,
            expires_at: expiry(now, ttl),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Current credential of a node. At most one exists per node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub node_id: NodeId,
    /// SHA-256 of the token value, hex encoded
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Mint a token; returns the record to persist and the value to hand out.
    #[must_use]
    pub fn issue(node_id: NodeId, now: DateTime<Utc>, ttl: TimeDelta) -> (Self, String) {
        let value = generate_secret(defaults::ACCESS_TOKEN_BYTES);
        let record = Self {
            node_id,
            digest: token_digest(&value),
            expires_at: expiry(now, ttl),
        };
        (record, value)
    }
}
