//! Domain models shared by the engine, the stores and the HTTP layer.

pub mod auth;
pub mod credentials;
