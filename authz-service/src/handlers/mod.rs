//! HTTP handlers.

pub mod audit;
pub mod org;
pub mod user;

use axum::extract::{Json, State};
use serde_json::json;

use crate::AppState;
use service_core::error::AppError;

/// Liveness and store connectivity probe.
///
/// GET /health
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await?;

    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}
