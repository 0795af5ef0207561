//! Liveness and store health.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /api/health`: report version and ephemeral store reachability.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let deadline = state.engine.config().store_timeout;
    let check = state.engine.store().health_check();
    let store_ok = match tokio::time::timeout(deadline, check).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "ephemeral store health check failed");
            false
        }
        Err(_) => {
            warn!(timeout_ms = deadline.as_millis() as u64, "ephemeral store health check timed out");
            false
        }
    };
    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.into(),
        version: sso_core::version().into(),
        store_ok,
    })
}
