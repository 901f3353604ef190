//! Keycloak Admin API client.
//!
//! # Purpose
//! Owns the privileged admin session and every downstream call the adapter
//! makes against Keycloak: resource lookups, authorization provisioning, and
//! client registration.
//!
//! # Architectural role
//! All remote records (clients, policies, permissions) are authoritative on
//! the Keycloak side. The client holds no durable copies; every operation
//! re-reads remote state immediately before mutating it.
//!
//! # Concurrency model
//! One instance is shared across requests behind an `Arc`. The admin session
//! lives in a `tokio::sync::RwLock` and is replaced wholesale on expiry;
//! concurrent re-authentications are tolerated (the remote side does not
//! invalidate concurrently issued tokens).
pub mod lookup;
pub mod provision;
pub mod registration;
pub mod session;
pub mod types;

use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use types::AdminSession;

/// Logical name of the realm-management client that owns the authorization
/// resource server for fine-grained admin permissions.
const MASTER_REALM_CLIENT: &str = "master-realm";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by downstream Keycloak calls.
#[derive(Debug, thiserror::Error)]
pub enum KeycloakError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("keycloak returned {status}: {body}")]
    RemoteStatus { status: StatusCode, body: String },
    #[error("ambiguous lookup: {0}")]
    AmbiguousLookup(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Connection settings for the admin client, extracted from configuration.
#[derive(Debug, Clone)]
pub struct KeycloakConnection {
    /// Base URL of the Keycloak deployment, e.g. `https://kc.example.org/auth`.
    pub base_url: String,
    pub realm: String,
    /// Password-grant credentials for the privileged admin session.
    pub admin_user: String,
    pub admin_password: String,
    /// The adapter's own service client, used for registration tokens.
    pub client_id: String,
    pub client_secret: String,
    /// Audience the registration subject token is exchanged towards.
    pub target_audience: String,
}

/// Client for the Keycloak Admin REST API and OAuth2 token endpoint.
pub struct KeycloakAdminClient {
    pub(crate) http: reqwest::Client,
    pub(crate) conn: KeycloakConnection,
    pub(crate) session: RwLock<Option<AdminSession>>,
    resource_server: OnceCell<String>,
}

impl KeycloakAdminClient {
    pub fn new(conn: KeycloakConnection) -> Result<Self, KeycloakError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            conn,
            session: RwLock::new(None),
            resource_server: OnceCell::new(),
        })
    }

    pub(crate) fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.conn.base_url, self.conn.realm
        )
    }

    pub(crate) fn clients_url(&self) -> String {
        format!(
            "{}/admin/realms/{}/clients",
            self.conn.base_url, self.conn.realm
        )
    }

    pub(crate) fn registration_url(&self) -> String {
        format!(
            "{}/realms/{}/clients-registrations/default",
            self.conn.base_url, self.conn.realm
        )
    }

    /// URL of an authorization sub-resource under the resource-server client.
    pub(crate) fn authz_url(&self, resource_server_id: &str, suffix: &str) -> String {
        format!(
            "{}/{}/authz/resource-server/{}",
            self.clients_url(),
            resource_server_id,
            suffix
        )
    }

    /// Physical id of the realm-management client, resolved once and cached
    /// for the process lifetime. Policies and permissions live under it.
    pub(crate) async fn resource_server_id(&self) -> Result<String, KeycloakError> {
        let id = self
            .resource_server
            .get_or_try_init(|| async {
                let client = self
                    .find_client_by_logical_id(MASTER_REALM_CLIENT)
                    .await?
                    .ok_or_else(|| {
                        KeycloakError::NotFound(format!("client '{MASTER_REALM_CLIENT}'"))
                    })?;
                Ok::<_, KeycloakError>(client.id)
            })
            .await?;
        Ok(id.clone())
    }
}

/// Pass the response through on success; read the body into an error on any
/// non-2xx status so callers never act on a failed mutation.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, KeycloakError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(KeycloakError::RemoteStatus { status, body })
}
