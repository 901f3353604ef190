//! HTTP application wiring.
//!
//! # Purpose
//! Builds the axum router and defines the shared application state injected
//! into handlers.
use crate::api;
use crate::auth::access::AccessRules;
use crate::auth::oidc::BearerValidator;
use crate::keycloak::KeycloakAdminClient;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub keycloak: Arc<KeycloakAdminClient>,
    pub validator: BearerValidator,
    pub access: AccessRules,
    pub api_version: String,
    pub realm: String,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            &format!("{API_PREFIX}/client/token-exchange-permissions"),
            axum::routing::post(api::clients::token_exchange_permissions),
        )
        .route(
            &format!("{API_PREFIX}/client/openid"),
            axum::routing::post(api::clients::create_openid_client),
        )
        .route(
            &format!("{API_PREFIX}/client/saml"),
            axum::routing::post(api::clients::create_saml_client),
        )
        .route(
            &format!("{API_PREFIX}/client"),
            axum::routing::post(api::clients::create_client),
        )
        .route(
            &format!("{API_PREFIX}/system/health"),
            axum::routing::get(api::system::system_health),
        )
        .route(
            &format!("{API_PREFIX}/system/info"),
            axum::routing::get(api::system::system_info),
        )
        .layer(trace_layer)
        .with_state(state)
}
