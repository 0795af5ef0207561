//! PostgreSQL credential store.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{CredentialStore, CredentialStoreError};
use crate::models::credentials::{
    Client, NewSubject, Permission, Role, Settings, Subject, SubjectWithPassword,
};

type SubjectRow = (
    i64,
    String,
    String,
    Option<String>,
    bool,
    Json<Settings>,
);

type SubjectWithPasswordRow = (
    i64,
    String,
    String,
    Option<String>,
    bool,
    Json<Settings>,
    String,
);

type ClientRow = (
    i64,
    String,
    Option<String>,
    String,
    String,
    Json<Vec<String>>,
    Json<Vec<String>>,
    bool,
    Json<Settings>,
);

fn subject_from_row(
    (id, username, email, full_name, active, Json(custom_attributes)): SubjectRow,
) -> Subject {
    Subject {
        id,
        username,
        email,
        full_name,
        active,
        custom_attributes,
    }
}

/// Credential store over the tables created by the embedded migrations.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>, CredentialStoreError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT id, name, description, client_id, client_secret, \
                    redirect_uris, allowed_scopes, active, settings \
             FROM applications WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(
                id,
                name,
                description,
                client_id,
                client_secret,
                Json(redirect_uris),
                Json(allowed_scopes),
                active,
                Json(settings),
            )| Client {
                id,
                name,
                description,
                client_id,
                client_secret,
                redirect_uris,
                allowed_scopes,
                active,
                settings,
            },
        ))
    }

    async fn find_subject(&self, subject_id: i64) -> Result<Option<Subject>, CredentialStoreError> {
        let row = sqlx::query_as::<_, SubjectRow>(
            "SELECT id, username, email, full_name, active, custom_attributes \
             FROM users WHERE id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(subject_from_row))
    }

    async fn find_subject_by_login(
        &self,
        login: &str,
    ) -> Result<Option<SubjectWithPassword>, CredentialStoreError> {
        // Username match wins over an email match on a different row.
        let row = sqlx::query_as::<_, SubjectWithPasswordRow>(
            "SELECT id, username, email, full_name, active, custom_attributes, password_hash \
             FROM users WHERE username = $1 OR email = $1 \
             ORDER BY (username = $1) DESC LIMIT 1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, username, email, full_name, active, attrs, password_hash)| SubjectWithPassword {
                subject: subject_from_row((id, username, email, full_name, active, attrs)),
                password_hash,
            },
        ))
    }

    async fn subject_roles(&self, subject_id: i64) -> Result<Vec<Role>, CredentialStoreError> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "SELECT r.id, r.name, r.description \
             FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 ORDER BY r.id",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, description)| Role {
                id,
                name,
                description,
            })
            .collect())
    }

    async fn role_permissions(
        &self,
        role_id: i64,
    ) -> Result<Vec<Permission>, CredentialStoreError> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>, String, String)>(
            "SELECT p.id, p.name, p.description, p.resource, p.action \
             FROM role_permissions rp JOIN permissions p ON p.id = rp.permission_id \
             WHERE rp.role_id = $1 ORDER BY p.id",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, description, resource, action)| Permission {
                id,
                name,
                description,
                resource,
                action,
            })
            .collect())
    }

    async fn username_or_email_taken(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, CredentialStoreError> {
        let (taken,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn create_subject(&self, new: NewSubject) -> Result<Subject, CredentialStoreError> {
        let row = sqlx::query_as::<_, SubjectRow>(
            "INSERT INTO users (username, email, full_name, password_hash) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, username, email, full_name, active, custom_attributes",
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.full_name)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CredentialStoreError::Conflict("Username or email already registered".into())
            }
            other => CredentialStoreError::Db(other),
        })?;
        Ok(subject_from_row(row))
    }
}
