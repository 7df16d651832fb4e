use axum::extract::State;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::{common::ApiResponse, health::HealthStatus},
};

/// GET|POST /healthz
pub async fn liveness(State(state): State<AppState>) -> Result<ApiResponse<HealthStatus>> {
    state
        .health_service
        .liveness()
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(ApiResponse::ok(HealthStatus::new("healthy", "I am alive")))
}

/// GET /readyz
pub async fn readiness(State(state): State<AppState>) -> Result<ApiResponse<HealthStatus>> {
    state.health_service.readiness().await.map_err(|e| {
        tracing::warn!("readiness check failed: {}", e);
        ApiError::Unavailable(e.to_string())
    })?;
    Ok(ApiResponse::ok(HealthStatus::new("ready", "ready to serve traffic")))
}

/// GET /errorz: always fails with an unclassified error
pub async fn errorz() -> Result<ApiResponse<HealthStatus>> {
    Err(anyhow::anyhow!("errorz: deliberate failure for error-path checks").into())
}
