//! Profile of the authenticated caller.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::UserInfoResponse;

/// `GET /userinfo`: profile for the bearer token's subject.
pub async fn userinfo_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserInfoResponse>> {
    let subject = state
        .engine
        .subject(claims.user_id)
        .await?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::Unauthorized("Subject no longer active".into()))?;

    Ok(Json(UserInfoResponse {
        sub: claims.sub,
        user_id: subject.id,
        username: subject.username,
        email: subject.email,
        name: subject.full_name,
        custom_attributes: subject.custom_attributes,
    }))
}
