//! Request handlers.

pub mod auth;
pub mod health;
pub mod oauth;
pub mod permissions;
pub mod userinfo;
