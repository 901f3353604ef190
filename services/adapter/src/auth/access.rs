//! Role and authorized-party access rules for the API surface.
//!
//! # Purpose
//! Turns a verified claim set into an authorization decision. Every failure
//! on this path collapses to a single outward observable (401 with the body
//! `Unauthorized`); the reason is logged server-side only.
use crate::api::error::{ApiError, api_gate_rejection};
use crate::app::AppState;
use crate::auth::oidc::VerifiedIdentity;
use axum::http::HeaderMap;

/// Access policy knobs, derived from configuration.
#[derive(Debug, Clone)]
pub struct AccessRules {
    /// `azp` values allowed to call the API regardless of roles.
    pub authorized_apps: Vec<String>,
    /// Role granting API-level access.
    pub api_access_role: String,
    /// Role granting a user access to operations on their own account.
    pub user_actions_role: String,
}

impl AccessRules {
    /// API-level access: allow-listed azp, or the API-access role.
    pub fn api_access(&self, identity: &VerifiedIdentity) -> bool {
        if let Some(azp) = &identity.azp
            && self.authorized_apps.iter().any(|app| app == azp)
        {
            return true;
        }
        identity.roles.iter().any(|role| *role == self.api_access_role)
    }

    /// User-or-API access for operations scoped to `username`.
    pub fn user_or_api_access(&self, identity: &VerifiedIdentity, username: &str) -> bool {
        let user_access = identity.sub == username
            && identity
                .roles
                .iter()
                .any(|role| *role == self.user_actions_role);
        user_access || self.api_access(identity)
    }
}

/// Extract and validate the bearer token, then require API-level access.
///
/// Returns the verified identity for the handler, or a uniform 401.
pub async fn require_api_access(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<VerifiedIdentity, ApiError> {
    let bearer = extract_bearer(headers).ok_or_else(|| {
        tracing::warn!("missing or malformed authorization header");
        api_gate_rejection()
    })?;
    let identity = state.validator.validate(bearer).await.map_err(|err| {
        tracing::warn!(error = %err, "token validation failed");
        api_gate_rejection()
    })?;
    if !state.access.api_access(&identity) {
        tracing::warn!(
            azp = identity.azp.as_deref().unwrap_or(""),
            sub = %identity.sub,
            "caller is not allowed to access the API"
        );
        return Err(api_gate_rejection());
    }
    Ok(identity)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    value.strip_prefix("Bearer ")
}
