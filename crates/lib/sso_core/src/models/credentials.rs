//! Credential store records: subjects, clients, roles and permissions.
//!
//! These are owned by the relational store. The engine only reads them,
//! apart from subject creation during registration.

use serde::{Deserialize, Serialize};

/// Opaque settings blob attached to subjects and clients.
///
/// Passed through verbatim; the core never interprets its contents.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// A user that can authenticate and hold roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Disabled subjects never receive tokens and never pass permission checks.
    pub active: bool,
    #[serde(default)]
    pub custom_attributes: Settings,
}

/// Subject with password hash (for the interactive login flow only).
#[derive(Debug, Clone)]
pub struct SubjectWithPassword {
    pub subject: Subject,
    pub password_hash: String,
}

/// Fields required to create a new subject.
#[derive(Debug, Clone)]
pub struct NewSubject {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
}

/// A registered OAuth client application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Redirect URIs, matched byte-for-byte.
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub active: bool,
    #[serde(default)]
    pub settings: Settings,
}

impl Client {
    /// Whether `uri` is byte-identical to one of the registered redirect URIs.
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Keep the requested scopes that appear in the allowed set, in request order.
    ///
    /// Each requested scope is tested independently; duplicates are dropped.
    pub fn filter_scopes(&self, requested: &[String]) -> Vec<String> {
        let mut valid: Vec<String> = Vec::new();
        for scope in requested {
            if self.allowed_scopes.contains(scope) && !valid.contains(scope) {
                valid.push(scope.clone());
            }
        }
        valid
    }
}

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// An atomic (resource, action) capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub resource: String,
    pub action: String,
}

impl Permission {
    /// Exact, case-sensitive match on both resource and action.
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}
