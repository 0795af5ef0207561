//! RBAC permission resolution.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::credentials::CredentialStore;

/// Walks subject → role → permission associations.
#[derive(Clone)]
pub struct PermissionResolver {
    credentials: Arc<dyn CredentialStore>,
    lookup_timeout: Duration,
}

impl PermissionResolver {
    pub fn new(credentials: Arc<dyn CredentialStore>, lookup_timeout: Duration) -> Self {
        Self {
            credentials,
            lookup_timeout,
        }
    }

    /// Whether `subject_id` holds `(resource, action)` through any of its roles.
    ///
    /// Never fails: an absent or disabled subject, a missing match and a
    /// failed lookup all answer `false`. A role whose permissions cannot be
    /// read is skipped and the remaining roles are still consulted.
    pub async fn has_permission(&self, subject_id: i64, resource: &str, action: &str) -> bool {
        let subject = tokio::time::timeout(
            self.lookup_timeout,
            self.credentials.find_subject(subject_id),
        )
        .await;
        match subject {
            Ok(Ok(Some(s))) if s.active => {}
            Ok(Ok(_)) => {
                debug!(subject_id, "permission check for absent or disabled subject");
                return false;
            }
            Ok(Err(e)) => {
                warn!(subject_id, error = %e, "subject lookup failed during permission check");
                return false;
            }
            Err(_) => {
                warn!(subject_id, "subject lookup timed out during permission check");
                return false;
            }
        }

        let roles = match tokio::time::timeout(
            self.lookup_timeout,
            self.credentials.subject_roles(subject_id),
        )
        .await
        {
            Ok(Ok(roles)) => roles,
            Ok(Err(e)) => {
                warn!(subject_id, error = %e, "role lookup failed");
                return false;
            }
            Err(_) => {
                warn!(subject_id, "role lookup timed out");
                return false;
            }
        };

        for role in roles {
            let permissions = match tokio::time::timeout(
                self.lookup_timeout,
                self.credentials.role_permissions(role.id),
            )
            .await
            {
                Ok(Ok(p)) => p,
                Ok(Err(e)) => {
                    warn!(subject_id, role_id = role.id, error = %e, "skipping unreadable role");
                    continue;
                }
                Err(_) => {
                    warn!(subject_id, role_id = role.id, "skipping role after lookup timeout");
                    continue;
                }
            };
            if permissions.iter().any(|p| p.grants(resource, action)) {
                debug!(subject_id, role = %role.name, resource, action, "permission granted");
                return true;
            }
        }
        debug!(subject_id, resource, action, "permission denied");
        false
    }
}
