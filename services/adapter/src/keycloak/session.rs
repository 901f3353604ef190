//! Admin session lifecycle and authenticated transport.
//!
//! # Purpose
//! Keeps a privileged admin bearer token valid across an unbounded sequence
//! of downstream calls. The token is acquired lazily on first use and
//! replaced via a full password grant whenever the remote side reports it
//! unauthorized.
//!
//! # Key invariants
//! - A 401 on an authenticated call triggers exactly one re-authentication
//!   and one retry; a second 401 is surfaced to the caller.
//! - The session slot is swapped atomically under the write lock; concurrent
//!   re-authentications are wasteful but safe.
//! - No expiry is tracked locally. Staleness is detected reactively, which
//!   tolerates clock skew and variable token lifetimes.
use super::types::{AdminSession, TokenResponse};
use super::{KeycloakAdminClient, KeycloakError, ensure_success};
use chrono::Utc;
use reqwest::{Method, StatusCode, header};
use serde_json::Value;

impl KeycloakAdminClient {
    /// Issue one raw HTTP call. Transport errors propagate; HTTP error
    /// statuses come back as ordinary responses so callers can branch.
    pub(crate) async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, KeycloakError> {
        Ok(request.send().await?)
    }

    /// Issue an admin-authenticated call, retrying once on authorization
    /// expiry with a freshly acquired session.
    pub(crate) async fn authenticated_send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, KeycloakError> {
        let build = |token: &str| {
            let mut request = self
                .http
                .request(method.clone(), url)
                .header(header::CONTENT_TYPE, "application/json")
                .bearer_auth(token);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            request
        };

        let token = self.current_token().await?;
        let response = self.send(build(&token)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(%url, "admin token rejected, re-authenticating");
        let token = self.reauthenticate().await?;
        self.send(build(&token)).await
    }

    /// Current admin access token, acquiring a session lazily on first use.
    async fn current_token(&self) -> Result<String, KeycloakError> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.access_token.clone());
        }
        let session = self.acquire_admin_session().await?;
        let token = session.access_token.clone();
        *self.session.write().await = Some(session);
        Ok(token)
    }

    /// Replace the admin session after a rejected call. Always a full
    /// password grant; the refresh-token flow is not reliably available.
    async fn reauthenticate(&self) -> Result<String, KeycloakError> {
        let session = self.acquire_admin_session().await?;
        let token = session.access_token.clone();
        *self.session.write().await = Some(session);
        metrics::counter!("adapter_admin_reauth_total").increment(1);
        Ok(token)
    }

    /// OAuth2 resource-owner-password grant against the realm token endpoint.
    ///
    /// This is the only place the admin credentials are used.
    pub async fn acquire_admin_session(&self) -> Result<AdminSession, KeycloakError> {
        tracing::debug!("acquiring admin access token");
        let params = [
            ("client_id", "admin-cli"),
            ("grant_type", "password"),
            ("username", self.conn.admin_user.as_str()),
            ("password", self.conn.admin_password.as_str()),
        ];
        let response = self
            .send(self.http.post(self.token_url()).form(&params))
            .await?;
        let raw: Value = ensure_success(response).await?.json().await?;
        let token: TokenResponse = serde_json::from_value(raw.clone())?;
        Ok(AdminSession {
            access_token: token.access_token,
            obtained_at: Utc::now(),
            raw,
        })
    }
}
