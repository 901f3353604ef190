//! API error types and helpers.
//!
//! # Purpose
//! Centralizes HTTP error response construction so error shapes stay uniform
//! across endpoints.
//!
//! # Security considerations
//! - Internal and auth-gate errors log details server-side but return
//!   generic messages; the gate always answers with the literal body
//!   `Unauthorized`.
use crate::api::types::ErrorResponse;
use crate::keycloak::KeycloakError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build a 400 Bad Request validation error.
pub fn api_validation_error(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorResponse {
            code: "validation_error".to_string(),
            message: message.to_string(),
        },
    }
}

/// Build the uniform auth-gate rejection.
///
/// Every gate failure (missing header, bad signature, bad claims, missing
/// role) returns exactly this response; detail never leaves the process.
pub fn api_gate_rejection() -> ApiError {
    metrics::counter!("adapter_unauthorized_total").increment(1);
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        body: ErrorResponse {
            code: "unauthorized".to_string(),
            message: "Unauthorized".to_string(),
        },
    }
}

/// Build a 500 Internal Server Error from a downstream Keycloak failure.
pub fn api_internal(message: &str, err: &KeycloakError) -> ApiError {
    // Log downstream details server-side; return a generic message.
    tracing::error!(error = %err, "keycloak call failed");
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            code: "internal".to_string(),
            message: message.to_string(),
        },
    }
}
