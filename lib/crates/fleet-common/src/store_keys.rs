/// Valkey key prefixes for fleet state
pub mod keys {
    /// Per-node change-tracking hash
    /// Format: fleet:changes:{node_id}
    /// Fields: one per change flag (0/1) plus `workloadConfigStamp` (unix millis)
    /// TTL: None (removed when the node is deregistered)
    pub const CHANGES: &str = "fleet:changes";

    /// Hash field holding the time of the last workload configuration change
    pub const CONFIG_STAMP_FIELD: &str = "workloadConfigStamp";
}

/// Lifetime defaults for provisioning secrets
pub mod defaults {
    /// Provisioning key lifetime (20 minutes)
    pub const PROVISION_KEY_TTL_SECS: u64 = 1200;

    /// Access token lifetime (30 days)
    pub const ACCESS_TOKEN_TTL_SECS: u64 = 2_592_000;

    /// Random bytes in a provisioning key (hex encoded: 16 chars)
    pub const PROVISION_KEY_BYTES: usize = 8;

    /// Random bytes in an access token (hex encoded: 64 chars)
    pub const ACCESS_TOKEN_BYTES: usize = 32;

    /// Longest accepted node id
    pub const MAX_NODE_ID_LEN: usize = 64;

    /// Longest accepted workload id
    pub const MAX_WORKLOAD_ID_LEN: usize = 64;
}

/// Image snapshot upload constants
pub mod snapshot {
    /// Multipart field carrying the archive
    pub const UPLOAD_FIELD: &str = "upstream";

    /// Suffix appended when a staged upload is published
    pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

    /// Workload marker meaning "the agent should capture and upload an image"
    pub const PENDING_CAPTURE: &str = "get_image";
}

pub fn change_key(node_id: &str) -> String {
    format!("{}:{}", keys::CHANGES, node_id)
}

/// Validate that a node id is 1..=64 chars of `[A-Za-z0-9_-]`.
/// SECURITY: call before constructing store keys from untrusted input; the
/// restriction keeps ids out of the `:`-separated key namespace.
pub fn validate_node_id(node_id: &str) -> Result<(), &'static str> {
    if node_id.is_empty() {
        return Err("node id must not be empty");
    }
    if node_id.len() > defaults::MAX_NODE_ID_LEN {
        return Err("node id must be at most 64 characters");
    }
    if !node_id.chars().all(is_id_char) {
        return Err("node id may only contain [A-Za-z0-9_-]");
    }
    Ok(())
}

/// Validate that a workload id is 1..=64 chars of `[A-Za-z0-9_-]`.
/// Workload ids name snapshot archives, so they must be safe path segments.
pub fn validate_workload_id(workload_id: &str) -> Result<(), &'static str> {
    if workload_id.is_empty() {
        return Err("workload id must not be empty");
    }
    if workload_id.len() > defaults::MAX_WORKLOAD_ID_LEN {
        return Err("workload id must be at most 64 characters");
    }
    if !workload_id.chars().all(is_id_char) {
        return Err("workload id may only contain [A-Za-z0-9_-]");
    }
    Ok(())
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
