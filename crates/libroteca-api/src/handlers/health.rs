use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use libroteca_core::AppError;
use serde_json::json;

use crate::error::HttpAppError;
use crate::state::AppState;

/// Liveness check. Answers as long as the process is up.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "alive" })))
}

/// Broker health check. Publishes a health probe job and reports whether
/// the queue accepted it. The probe is consumed and acknowledged without
/// any side effect.
pub async fn queue_health(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    const TIMEOUT: Duration = Duration::from_secs(5);

    match tokio::time::timeout(TIMEOUT, state.queue.publish_health_probe()).await {
        Ok(Ok(())) => Ok(Json(json!({
            "status": "ok",
            "queue": state.queue.queue_name(),
            "connected": state.queue.is_connected(),
        }))),
        Ok(Err(e)) => Err(AppError::Queue(format!("health probe failed: {e:#}")).into()),
        Err(_) => Err(AppError::Timeout {
            operation: "publishing queue health probe".to_string(),
        }
        .into()),
    }
}
