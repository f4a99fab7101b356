use serde::{Deserialize, Serialize};

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Error kind: `NotFoundError`, `AuthenticationError`, `ValidationError` or `InternalError`
    pub name: String,
    pub message: String,
    /// Offending entities for aggregated validation failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}
