//! Remote resource representations for the Keycloak Admin API.
//!
//! # Purpose
//! Defines the wire shapes the adapter reads from and writes back to
//! Keycloak. Field names follow the Keycloak REST contract exactly and must
//! not be renamed.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Admin bearer session obtained via the password grant.
///
/// Replaced wholesale on every re-authentication; never mutated in place.
/// No expiry is tracked locally, staleness is detected from a 401 response.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub access_token: String,
    pub obtained_at: DateTime<Utc>,
    pub raw: Value,
}

/// Token endpoint response for any of the OAuth2 grants the adapter uses.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Client as returned by `/admin/realms/{realm}/clients`.
///
/// `client_id` is the human-assigned logical name; `id` is the opaque
/// physical identifier Keycloak addresses the client by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decision strategy of an authorization permission or policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionStrategy {
    Unanimous,
    Affirmative,
    Consensus,
}

/// Client policy as returned by the resource-server policy endpoints.
///
/// Keycloak encodes the subscribed client list as a JSON string inside
/// `config.clients`, so reads go through [`PolicyRecord::subscribed_clients`].
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default)]
    pub logic: Option<String>,
    #[serde(rename = "decisionStrategy")]
    pub decision_strategy: DecisionStrategy,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: PolicyConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub clients: Option<String>,
}

impl PolicyRecord {
    /// Decode the JSON-string-encoded client id list from `config.clients`.
    pub fn subscribed_clients(&self) -> Result<Vec<String>, serde_json::Error> {
        match &self.config.clients {
            Some(raw) => serde_json::from_str(raw),
            None => Ok(Vec::new()),
        }
    }
}

/// Write payload for creating or updating a client policy.
#[derive(Debug, Clone, Serialize)]
pub struct ClientPolicyPayload {
    pub clients: Vec<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub description: String,
    pub logic: String,
    #[serde(rename = "decisionStrategy")]
    pub decision_strategy: DecisionStrategy,
}

impl ClientPolicyPayload {
    pub fn client_policy(name: &str, description: &str, clients: Vec<String>) -> Self {
        Self {
            clients,
            name: name.to_string(),
            policy_type: "client".to_string(),
            description: description.to_string(),
            logic: "POSITIVE".to_string(),
            decision_strategy: DecisionStrategy::Unanimous,
        }
    }
}

/// Scope permission as fetched from the resource-server permission endpoint.
///
/// The permission is read, mutated (`policies`, `decision_strategy`) and PUT
/// back whole; `extra` carries all remaining fields through the round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "decisionStrategy")]
    pub decision_strategy: DecisionStrategy,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Client registration payload for the `clients-registrations` endpoint.
///
/// Named fields cover the attributes the adapter defaults; `extra` is an
/// open extension map for any further Keycloak client representation fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientRegistration {
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(rename = "redirectUris", skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Client protocols supported by the registration endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProtocol {
    OpenIdConnect,
    Saml,
}

impl ClientProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenIdConnect => "openid-connect",
            Self::Saml => "saml",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "openid-connect" => Some(Self::OpenIdConnect),
            "saml" => Some(Self::Saml),
            _ => None,
        }
    }
}
