//! System/health API handlers.
//!
//! # Purpose
//! Lightweight endpoints for probes and operators. Health is side-effect
//! free and does not touch Keycloak.
use crate::api::types::{HealthStatus, SystemInfo};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

pub(crate) async fn system_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}

pub(crate) async fn system_info(State(state): State<AppState>) -> Json<SystemInfo> {
    // Built from in-memory configuration; no I/O.
    Json(SystemInfo {
        api_version: state.api_version.clone(),
        realm: state.realm.clone(),
    })
}
