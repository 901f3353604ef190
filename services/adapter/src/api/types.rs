//! HTTP API request/response types.
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemInfo {
    pub api_version: String,
    pub realm: String,
}

/// Body for `POST /client/token-exchange-permissions`. Both names refer to
/// logical `clientId` values; fields are optional so missing ones can be
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TokenExchangePermissionRequest {
    pub target: Option<String>,
    pub requestor: Option<String>,
}

/// Outcome of a grant: the remote API's reason string for the final update.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GrantResponse {
    pub status: String,
}
