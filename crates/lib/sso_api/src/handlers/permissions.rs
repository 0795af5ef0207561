//! Permission check handlers.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use crate::AppState;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{PermissionCheckParams, PermissionCheckResponse};

async fn check(
    state: &AppState,
    subject_id: i64,
    params: PermissionCheckParams,
) -> Json<PermissionCheckResponse> {
    let allowed = state
        .resolver
        .has_permission(subject_id, &params.resource, &params.action)
        .await;
    Json(PermissionCheckResponse {
        subject_id,
        resource: params.resource,
        action: params.action,
        allowed,
    })
}

/// `GET /api/permissions/check?resource=&action=`: evaluate the caller.
pub async fn check_own_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Query(params): Query<PermissionCheckParams>,
) -> Json<PermissionCheckResponse> {
    check(&state, claims.user_id, params).await
}

/// `GET /api/subjects/{id}/permissions/check`: evaluate another subject.
pub async fn check_subject_handler(
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
    Query(params): Query<PermissionCheckParams>,
) -> Json<PermissionCheckResponse> {
    check(&state, subject_id, params).await
}
