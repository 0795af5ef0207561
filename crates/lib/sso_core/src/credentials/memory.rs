//! In-memory credential store.
//!
//! Seedable stand-in for the relational store, used by tests and local
//! development runs. Broken role associations can be injected to exercise
//! the resolver's degrade-gracefully path.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{CredentialStore, CredentialStoreError};
use crate::models::credentials::{
    Client, NewSubject, Permission, Role, Settings, Subject, SubjectWithPassword,
};

#[derive(Debug, Default)]
struct Tables {
    subjects: HashMap<i64, SubjectWithPassword>,
    clients: HashMap<String, Client>,
    roles: HashMap<i64, Role>,
    permissions: HashMap<i64, Permission>,
    subject_roles: HashMap<i64, Vec<i64>>,
    role_permissions: HashMap<i64, Vec<i64>>,
    broken_roles: HashSet<i64>,
    next_subject_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, CredentialStoreError> {
        self.tables
            .read()
            .map_err(|_| CredentialStoreError::Corrupt("credential tables poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, CredentialStoreError> {
        self.tables
            .write()
            .map_err(|_| CredentialStoreError::Corrupt("credential tables poisoned".into()))
    }

    pub fn insert_subject(&self, subject: Subject, password_hash: &str) {
        if let Ok(mut t) = self.write() {
            t.next_subject_id = t.next_subject_id.max(subject.id);
            t.subjects.insert(
                subject.id,
                SubjectWithPassword {
                    subject,
                    password_hash: password_hash.to_string(),
                },
            );
        }
    }

    pub fn set_subject_active(&self, subject_id: i64, active: bool) {
        if let Ok(mut t) = self.write()
            && let Some(s) = t.subjects.get_mut(&subject_id)
        {
            s.subject.active = active;
        }
    }

    pub fn insert_client(&self, client: Client) {
        if let Ok(mut t) = self.write() {
            t.clients.insert(client.client_id.clone(), client);
        }
    }

    pub fn set_client_active(&self, client_id: &str, active: bool) {
        if let Ok(mut t) = self.write()
            && let Some(c) = t.clients.get_mut(client_id)
        {
            c.active = active;
        }
    }

    pub fn insert_role(&self, role: Role) {
        if let Ok(mut t) = self.write() {
            t.roles.insert(role.id, role);
        }
    }

    pub fn insert_permission(&self, permission: Permission) {
        if let Ok(mut t) = self.write() {
            t.permissions.insert(permission.id, permission);
        }
    }

    pub fn assign_role(&self, subject_id: i64, role_id: i64) {
        if let Ok(mut t) = self.write() {
            t.subject_roles.entry(subject_id).or_default().push(role_id);
        }
    }

    pub fn grant_permission(&self, role_id: i64, permission_id: i64) {
        if let Ok(mut t) = self.write() {
            t.role_permissions
                .entry(role_id)
                .or_default()
                .push(permission_id);
        }
    }

    /// Make permission lookups for `role_id` fail.
    pub fn break_role(&self, role_id: i64) {
        if let Ok(mut t) = self.write() {
            t.broken_roles.insert(role_id);
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>, CredentialStoreError> {
        Ok(self.read()?.clients.get(client_id).cloned())
    }

    async fn find_subject(&self, subject_id: i64) -> Result<Option<Subject>, CredentialStoreError> {
        Ok(self
            .read()?
            .subjects
            .get(&subject_id)
            .map(|s| s.subject.clone()))
    }

    async fn find_subject_by_login(
        &self,
        login: &str,
    ) -> Result<Option<SubjectWithPassword>, CredentialStoreError> {
        let t = self.read()?;
        let by_username = t.subjects.values().find(|s| s.subject.username == login);
        let found = by_username.or_else(|| t.subjects.values().find(|s| s.subject.email == login));
        Ok(found.cloned())
    }

    async fn subject_roles(&self, subject_id: i64) -> Result<Vec<Role>, CredentialStoreError> {
        let t = self.read()?;
        Ok(t.subject_roles
            .get(&subject_id)
            .into_iter()
            .flatten()
            .filter_map(|id| t.roles.get(id).cloned())
            .collect())
    }

    async fn role_permissions(
        &self,
        role_id: i64,
    ) -> Result<Vec<Permission>, CredentialStoreError> {
        let t = self.read()?;
        if t.broken_roles.contains(&role_id) {
            return Err(CredentialStoreError::Corrupt(format!(
                "role {role_id} permissions unreadable"
            )));
        }
        Ok(t.role_permissions
            .get(&role_id)
            .into_iter()
            .flatten()
            .filter_map(|id| t.permissions.get(id).cloned())
            .collect())
    }

    async fn username_or_email_taken(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, CredentialStoreError> {
        Ok(self
            .read()?
            .subjects
            .values()
            .any(|s| s.subject.username == username || s.subject.email == email))
    }

    async fn create_subject(&self, new: NewSubject) -> Result<Subject, CredentialStoreError> {
        let mut t = self.write()?;
        if t.subjects.values().any(|s| s.subject.email == new.email) {
            return Err(CredentialStoreError::Conflict("Email already registered".into()));
        }
        if t.subjects.values().any(|s| s.subject.username == new.username) {
            return Err(CredentialStoreError::Conflict("Username already taken".into()));
        }
        t.next_subject_id += 1;
        let subject = Subject {
            id: t.next_subject_id,
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            active: true,
            custom_attributes: Settings::new(),
        };
        t.subjects.insert(
            subject.id,
            SubjectWithPassword {
                subject: subject.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(subject)
    }
}
