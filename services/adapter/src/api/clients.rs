//! Client management API handlers.
//!
//! # Purpose
//! The four `/client` endpoints: granting token-exchange permissions between
//! two existing clients, and registering new OpenID Connect or SAML clients.
//! Every handler passes the token validation gate before touching Keycloak.
use crate::api::error::{ApiError, api_internal, api_validation_error};
use crate::api::types::{GrantResponse, TokenExchangePermissionRequest};
use crate::app::AppState;
use crate::auth::access::require_api_access;
use crate::keycloak::types::{ClientProtocol, ClientRegistration};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::Value;

/// `POST /client/token-exchange-permissions`
///
/// Grants `requestor` the right to exchange tokens for `target`. Both are
/// logical client names resolved against the realm before provisioning.
pub(crate) async fn token_exchange_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<TokenExchangePermissionRequest>>,
) -> Result<Json<GrantResponse>, ApiError> {
    require_api_access(&state, &headers).await?;

    let request = body.map(|Json(value)| value).unwrap_or_default();
    let (Some(target), Some(requestor)) = (request.target, request.requestor) else {
        return Err(api_validation_error(
            "The request is missing 'target' or 'requestor'. They must be passed as a query parameter",
        ));
    };

    let target_client = state
        .keycloak
        .find_client_by_logical_id(&target)
        .await
        .map_err(|err| api_internal("failed to look up target client", &err))?;
    let requestor_client = state
        .keycloak
        .find_client_by_logical_id(&requestor)
        .await
        .map_err(|err| api_internal("failed to look up requestor client", &err))?;
    let (Some(target_client), Some(requestor_client)) = (target_client, requestor_client) else {
        return Err(api_validation_error(&format!(
            "Verify '{target}' and '{requestor}' exist"
        )));
    };

    let status = state
        .keycloak
        .grant_token_exchange(&target_client.id, &requestor_client.id)
        .await
        .map_err(|err| api_internal("failed to grant token exchange", &err))?;
    Ok(Json(GrantResponse {
        status: status.canonical_reason().unwrap_or("OK").to_string(),
    }))
}

/// `POST /client/openid`
pub(crate) async fn create_openid_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<ClientRegistration>>,
) -> Result<Json<Value>, ApiError> {
    require_api_access(&state, &headers).await?;
    let registration = require_client_id(body)?;
    register(&state, ClientProtocol::OpenIdConnect, registration).await
}

/// `POST /client/saml`
pub(crate) async fn create_saml_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<ClientRegistration>>,
) -> Result<Json<Value>, ApiError> {
    require_api_access(&state, &headers).await?;
    let registration = require_client_id(body)?;
    register(&state, ClientProtocol::Saml, registration).await
}

/// `POST /client`
///
/// Generic registration; the protocol is taken from the body and must be
/// one of the supported values.
pub(crate) async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<ClientRegistration>>,
) -> Result<Json<Value>, ApiError> {
    require_api_access(&state, &headers).await?;

    let registration = body.map(|Json(value)| value).unwrap_or_default();
    if registration.client_id.is_none() || registration.protocol.is_none() {
        return Err(api_validation_error(
            "The request is missing the 'clientId' or 'protocol'. They must be passed as a query parameter.",
        ));
    }
    let protocol = registration
        .protocol
        .as_deref()
        .and_then(ClientProtocol::parse)
        .ok_or_else(|| {
            api_validation_error(
                "The request is invalid. 'protocol' only supports 'saml' and 'openid-connect' values",
            )
        })?;
    register(&state, protocol, registration).await
}

fn require_client_id(
    body: Option<Json<ClientRegistration>>,
) -> Result<ClientRegistration, ApiError> {
    let registration = body.map(|Json(value)| value).unwrap_or_default();
    if registration.client_id.is_none() {
        return Err(api_validation_error(
            "The request is missing the 'clientId'. It must be passed as a query parameter",
        ));
    }
    Ok(registration)
}

async fn register(
    state: &AppState,
    protocol: ClientProtocol,
    registration: ClientRegistration,
) -> Result<Json<Value>, ApiError> {
    let created = state
        .keycloak
        .register_client(protocol, registration)
        .await
        .map_err(|err| api_internal("failed to register client", &err))?;
    Ok(Json(created))
}
