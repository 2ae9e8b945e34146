//! Uploader avatar refresh job.

use libroteca_core::models::JobOutcome;
use libroteca_core::JobError;

use crate::state::AppState;

use super::into_job_error;

/// Bulk avatar refresh across all known uploaders.
pub async fn run(state: &AppState) -> Result<JobOutcome, JobError> {
    let updated = state
        .uploader_registry
        .refresh_avatars()
        .await
        .map_err(into_job_error)?;
    tracing::info!(updated, "Uploader avatars refreshed");
    Ok(JobOutcome::Completed)
}
