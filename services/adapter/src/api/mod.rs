//! HTTP API module.
//!
//! # Purpose
//! Exposes the route handler modules and the shared error/payload types.
pub mod clients;
pub mod error;
pub mod system;
pub mod types;
