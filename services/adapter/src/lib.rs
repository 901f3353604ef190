//! Keycloak REST adapter library crate.
//!
//! # Purpose
//! Exposes the API surface, auth gate, configuration, and the Keycloak admin
//! client for use by the binary and the integration tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod keycloak;
pub mod observability;
