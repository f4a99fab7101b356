use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::store_keys::defaults;

/// Control-plane server configuration.
///
/// Loaded from `FLEET_*` environment variables by the server binary; every
/// field has a default except the optional Valkey and seed settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Listen address (default: 0.0.0.0:54421)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Directory receiving uploaded image snapshots
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Largest accepted snapshot upload in bytes
    #[serde(default = "default_snapshot_max_bytes")]
    pub snapshot_max_bytes: usize,

    /// Lifetime of freshly minted provisioning keys
    #[serde(default = "default_provision_key_ttl")]
    pub provision_key_ttl_secs: u64,

    /// Lifetime of access tokens issued at provisioning
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: u64,

    /// Valkey URL for change tracking. In-process tracking when unset.
    #[serde(default)]
    pub valkey_url: Option<String>,

    /// ACL username for Valkey
    #[serde(default)]
    pub valkey_user: Option<String>,

    /// File holding the Valkey ACL password (Docker secret)
    #[serde(default)]
    pub valkey_pass_file: Option<PathBuf>,

    /// CA bundle for Valkey TLS. mTLS is enabled when all three paths are set.
    #[serde(default)]
    pub valkey_ca: Option<PathBuf>,

    #[serde(default)]
    pub valkey_client_cert: Option<PathBuf>,

    #[serde(default)]
    pub valkey_client_key: Option<PathBuf>,

    /// JSON fixture loaded into the in-memory store at startup
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 54421))
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("/var/lib/fleet/snapshots")
}

fn default_snapshot_max_bytes() -> usize {
    1024 * 1024 * 1024
}

fn default_provision_key_ttl() -> u64 {
    defaults::PROVISION_KEY_TTL_SECS
}

fn default_access_token_ttl() -> u64 {
    defaults::ACCESS_TOKEN_TTL_SECS
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            snapshot_dir: default_snapshot_dir(),
            snapshot_max_bytes: default_snapshot_max_bytes(),
            provision_key_ttl_secs: default_provision_key_ttl(),
            access_token_ttl_secs: default_access_token_ttl(),
            valkey_url: None,
            valkey_user: None,
            valkey_pass_file: None,
            valkey_ca: None,
            valkey_client_cert: None,
            valkey_client_key: None,
            seed_file: None,
        }
    }
}

impl ControllerConfig {
    /// Client certificate paths, present only when the CA, cert and key are all configured.
    #[must_use]
    pub fn valkey_tls_paths(&self) -> Option<(&PathBuf, &PathBuf, &PathBuf)> {
        match (
            &self.valkey_ca,
            &self.valkey_client_cert,
            &self.valkey_client_key,
        ) {
            (Some(ca), Some(cert), Some(key)) => Some((ca, cert, key)),
            _ => None,
        }
    }
}
