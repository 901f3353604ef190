//! Inbound authentication and authorization.
//!
//! # Purpose
//! Groups bearer-token validation against the identity provider's key set
//! and the role/azp access rules applied before handlers run.
pub mod access;
pub mod oidc;
