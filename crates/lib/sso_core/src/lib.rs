//! # sso_core
//!
//! Token lifecycle and permission-evaluation engine for the SSO server.
//!
//! The engine issues single-use authorization codes, exchanges them for
//! signed token pairs, rotates refresh tokens against a revocation
//! blacklist, and resolves subject → role → permission capabilities. All
//! shared state lives behind the [`store::EphemeralStore`] and
//! [`credentials::CredentialStore`] contracts.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod migrate;
pub mod models;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
