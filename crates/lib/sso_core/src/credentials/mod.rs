//! Credential store contract.
//!
//! Durable records for subjects, clients, roles and permissions live in a
//! relational store. The engine needs lookups by id or unique key plus
//! subject creation; administrative CRUD is out of scope here.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::credentials::{
    Client, NewSubject, Permission, Role, Subject, SubjectWithPassword,
};

/// Errors raised by credential store backends.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Read access to the durable RBAC and client records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a client application by its public client id.
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>, CredentialStoreError>;

    /// Look up a subject by numeric id.
    async fn find_subject(&self, subject_id: i64) -> Result<Option<Subject>, CredentialStoreError>;

    /// Look up a subject by username, falling back to email.
    async fn find_subject_by_login(
        &self,
        login: &str,
    ) -> Result<Option<SubjectWithPassword>, CredentialStoreError>;

    /// Roles attached to a subject.
    async fn subject_roles(&self, subject_id: i64) -> Result<Vec<Role>, CredentialStoreError>;

    /// Permissions attached to a role.
    async fn role_permissions(&self, role_id: i64)
    -> Result<Vec<Permission>, CredentialStoreError>;

    /// Whether a subject already holds `username` or `email`.
    async fn username_or_email_taken(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, CredentialStoreError>;

    /// Create a subject. Fails with `Conflict` if username or email is taken.
    async fn create_subject(&self, new: NewSubject) -> Result<Subject, CredentialStoreError>;
}
