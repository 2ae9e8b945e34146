use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::HttpAppError;
use crate::services::{EnrichSummary, RefreshOutcome};
use crate::state::AppState;

/// Kicks off a refresh pass against the chat source. Returns immediately
/// with 409 when another pass is still running.
pub async fn refresh_library(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let outcome = state.library.refresh().await?;
    Ok(refresh_response(outcome))
}

/// Same pass as a refresh, but fed from the repository source. 400 when
/// no repository is configured.
pub async fn sync_repository(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let outcome = state.library.sync_repository().await?;
    Ok(refresh_response(outcome))
}

/// Re-enqueues description and keyword jobs for records the nightly
/// pipeline left behind.
pub async fn enrich_library(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EnrichSummary>, HttpAppError> {
    let summary = state.library.enrich().await?;
    Ok(Json(summary))
}

fn refresh_response(outcome: RefreshOutcome) -> (StatusCode, Json<RefreshOutcome>) {
    let status = match outcome {
        RefreshOutcome::AlreadyRunning => StatusCode::CONFLICT,
        RefreshOutcome::UpToDate | RefreshOutcome::Enqueued { .. } => StatusCode::OK,
    };
    (status, Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_refresh_maps_to_conflict() {
        let (status, _) = refresh_response(RefreshOutcome::AlreadyRunning);
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn completed_refresh_maps_to_ok() {
        let (status, _) = refresh_response(RefreshOutcome::UpToDate);
        assert_eq!(status, StatusCode::OK);

        let (status, _) = refresh_response(RefreshOutcome::Enqueued { jobs: 12 });
        assert_eq!(status, StatusCode::OK);
    }
}
