//! Valkey-backed change tracker using a Fred client, with optional mTLS via rustls.
//!
//! One hash per node at `fleet:changes:{node_id}` with a `0`/`1` field per
//! flag. Mark and drain run as Lua scripts so each is a single atomic step
//! on the server: a concurrent `HSET` lands either before a drain's read or
//! after its reset, never in between.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fred::prelude::*;
use fred::types::config::{TlsConfig, TlsConnector, TlsHostMapping};
use fleet_common::{ChangeFlag, ChangeSet, ControllerConfig, NodeId, change_key, keys};

use crate::application::ports::{ChangeTracker, StoreResult};
use crate::error::StoreError;

/// Create every flag field at `0` unless it already exists.
const REGISTER_SCRIPT: &str = r"
for _, field in ipairs(ARGV) do
  redis.call('HSETNX', KEYS[1], field, 0)
end
return 1
";

/// ARGV[1] is the config stamp (empty for none); the rest are flags to set.
const MARK_SCRIPT: &str = r"
for i = 2, #ARGV do
  redis.call('HSET', KEYS[1], ARGV[i], 1)
end
if ARGV[1] ~= '' then
  redis.call('HSET', KEYS[1], 'workloadConfigStamp', ARGV[1])
end
return 1
";

/// Returns nil for an unknown node, else the pre-reset value of each ARGV field.
const DRAIN_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return false
end
local out = {}
for i, field in ipairs(ARGV) do
  out[i] = tonumber(redis.call('HGET', KEYS[1], field) or '0')
  redis.call('HSET', KEYS[1], field, 0)
end
return out
";

/// Connection-level failures are retryable; everything else is a backend fault.
fn backend(err: &fred::error::Error) -> StoreError {
    match err.kind() {
        fred::error::ErrorKind::IO
        | fred::error::ErrorKind::Timeout
        | fred::error::ErrorKind::Canceled => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn flag_fields() -> Vec<String> {
    ChangeFlag::ALL
        .iter()
        .map(|flag| flag.field_name().to_string())
        .collect()
}

fn load_tls(ca_path: &Path, cert_path: &Path, key_path: &Path) -> Result<rustls::ClientConfig> {
    let ca_file = File::open(ca_path)
        .with_context(|| format!("failed to open CA cert: {}", ca_path.display()))?;
    let ca_certs = rustls_pemfile::certs(&mut BufReader::new(ca_file))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse CA cert")?;
    let mut root_store = rustls::RootCertStore::empty();
    for cert in ca_certs {
        root_store
            .add(cert)
            .context("failed to add CA cert to root store")?;
    }

    let cert_file = File::open(cert_path)
        .with_context(|| format!("failed to open client cert: {}", cert_path.display()))?;
    let client_certs = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse client cert")?;

    let key_file = File::open(key_path)
        .with_context(|| format!("failed to open client key: {}", key_path.display()))?;
    let client_key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .context("failed to parse client key")?
        .context("no private key found in file")?;

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_client_auth_cert(client_certs, client_key)
        .context("failed to build TLS config with client auth")
}

#[derive(Clone)]
pub struct ValkeyChangeTracker {
    client: Client,
}

impl ValkeyChangeTracker {
    /// Connect using the `valkey_*` settings and verify with PING.
    ///
    /// # Errors
    ///
    /// Returns an error if no URL is configured, TLS material cannot be
    /// loaded, or the server is unreachable.
    pub async fn connect(config: &ControllerConfig, password: Option<String>) -> Result<Self> {
        let url = config
            .valkey_url
            .as_deref()
            .context("valkey_url is not configured")?;

        let mut fred_config = Config::from_url(url)?;
        let mtls = if let Some((ca, cert, key)) = config.valkey_tls_paths() {
            let tls_config = load_tls(ca, cert, key)?;
            fred_config.tls = Some(TlsConfig {
                connector: TlsConnector::Rustls(Arc::new(tls_config).into()),
                hostnames: TlsHostMapping::None,
            });
            true
        } else {
            false
        };
        if let Some(user) = &config.valkey_user {
            fred_config.username = Some(user.clone());
        }
        if password.is_some() {
            fred_config.password = password;
        }

        let client = Builder::from_config(fred_config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(5);
                conn_config.internal_command_timeout = Duration::from_secs(10);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 5000, 5))
            .build()?;

        client.init().await?;
        client
            .ping::<String>(None)
            .await
            .context("Valkey startup PING failed")?;

        tracing::info!(mtls, "Valkey change tracker ready");
        Ok(Self { client })
    }

    /// Wrap an already initialised client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChangeTracker for ValkeyChangeTracker {
    async fn register(&self, node: &NodeId) -> StoreResult<()> {
        let mut fields = flag_fields();
        fields.push(keys::CONFIG_STAMP_FIELD.to_string());
        self.client
            .eval::<i64, _, _, _>(REGISTER_SCRIPT, vec![change_key(node.as_str())], fields)
            .await
            .map_err(|e| backend(&e))?;
        Ok(())
    }

    async fn mark(
        &self,
        node: &NodeId,
        changes: ChangeSet,
        config_stamp: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let stamp = config_stamp
            .map(|at| at.timestamp_millis().to_string())
            .unwrap_or_default();
        let args: Vec<String> = std::iter::once(stamp)
            .chain(changes.iter().map(|flag| flag.field_name().to_string()))
            .collect();
        self.client
            .eval::<i64, _, _, _>(MARK_SCRIPT, vec![change_key(node.as_str())], args)
            .await
            .map_err(|e| backend(&e))?;
        Ok(())
    }

    async fn drain(&self, node: &NodeId) -> StoreResult<Option<ChangeSet>> {
        let values: Option<Vec<i64>> = self
            .client
            .eval(DRAIN_SCRIPT, vec![change_key(node.as_str())], flag_fields())
            .await
            .map_err(|e| backend(&e))?;
        Ok(values.map(|values| {
            ChangeFlag::ALL
                .into_iter()
                .zip(values)
                .filter(|(_, value)| *value != 0)
                .map(|(flag, _)| flag)
                .collect()
        }))
    }

    async fn forget(&self, node: &NodeId) -> StoreResult<()> {
        self.client
            .del::<i64, _>(change_key(node.as_str()))
            .await
            .map_err(|e| backend(&e))?;
        Ok(())
    }
}
