//! Client registration via the service's own credentials.
//!
//! # Purpose
//! Registers new OpenID Connect and SAML clients. Registration does not use
//! the admin session: the adapter obtains a token with its own client
//! credentials and exchanges it for an audience-scoped token before calling
//! the registration endpoint.
//!
//! Grant-type and token-type strings are part of the OAuth2 token-exchange
//! contract and must stay bit-exact.
use super::types::{ClientProtocol, ClientRegistration, TokenResponse};
use super::{KeycloakAdminClient, KeycloakError, ensure_success};
use serde_json::Value;

const GRANT_TYPE_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const SUBJECT_TOKEN_TYPE_ACCESS_TOKEN: &str = "urn:ietf:params:oauth:token-type:access_token";

impl KeycloakAdminClient {
    /// OAuth2 client-credentials grant for the adapter's own client.
    pub async fn client_credentials_token(&self) -> Result<TokenResponse, KeycloakError> {
        let params = [
            ("client_id", self.conn.client_id.as_str()),
            ("grant_type", "client_credentials"),
            ("client_secret", self.conn.client_secret.as_str()),
        ];
        let response = self
            .send(self.http.post(self.token_url()).form(&params))
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    /// Exchange `subject_token` for a token scoped to the configured
    /// registration audience.
    pub async fn token_exchange_token(
        &self,
        subject_token: &str,
        audience: &str,
    ) -> Result<TokenResponse, KeycloakError> {
        let params = [
            ("client_id", self.conn.client_id.as_str()),
            ("grant_type", GRANT_TYPE_TOKEN_EXCHANGE),
            ("client_secret", self.conn.client_secret.as_str()),
            ("subject_token_type", SUBJECT_TOKEN_TYPE_ACCESS_TOKEN),
            ("subject_token", subject_token),
            ("audience", audience),
        ];
        let response = self
            .send(self.http.post(self.token_url()).form(&params))
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    /// Access token for the registration endpoint: client-credentials grant
    /// followed by a token exchange towards the target audience.
    async fn registration_access_token(&self) -> Result<String, KeycloakError> {
        let credentials = self.client_credentials_token().await?;
        let exchanged = self
            .token_exchange_token(&credentials.access_token, &self.conn.target_audience)
            .await?;
        Ok(exchanged.access_token)
    }

    /// Register a new client with protocol-specific defaults applied.
    ///
    /// Missing `redirectUris` defaults to an empty list and `attributes` to
    /// an empty map; `protocol` is forced to the requested kind.
    pub async fn register_client(
        &self,
        protocol: ClientProtocol,
        mut registration: ClientRegistration,
    ) -> Result<Value, KeycloakError> {
        apply_registration_defaults(protocol, &mut registration);

        tracing::info!(
            client = registration.client_id.as_deref().unwrap_or(""),
            protocol = protocol.as_str(),
            "registering client"
        );
        let token = self.registration_access_token().await?;
        let response = self
            .send(
                self.http
                    .post(self.registration_url())
                    .bearer_auth(token)
                    .json(&registration),
            )
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

/// Minimum defaults for a registration payload of the given protocol.
fn apply_registration_defaults(protocol: ClientProtocol, registration: &mut ClientRegistration) {
    registration.redirect_uris.get_or_insert_with(Vec::new);
    registration.attributes.get_or_insert_with(Default::default);
    registration.protocol = Some(protocol.as_str().to_string());
}
