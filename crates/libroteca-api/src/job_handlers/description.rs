//! AI description and subject backfill job.

use libroteca_core::models::{JobOutcome, SkipReason};
use libroteca_core::JobError;
use libroteca_extract::normalize_description;

use crate::services::with_call_timeout;
use crate::state::AppState;

use super::into_job_error;

/// Generate a description and a subject for a record whose detail row still
/// has empty ones. Fields that already hold a value are left alone, and the
/// store-side backfills carry the same empty-field guard.
pub async fn run(state: &AppState, book_id: i64) -> Result<JobOutcome, JobError> {
    let detail = match state
        .db
        .details
        .find_by_book_id(book_id)
        .await
        .map_err(into_job_error)?
    {
        Some(detail) => detail,
        None => {
            tracing::warn!(book_id, "No detail row yet, skipping description");
            return Ok(JobOutcome::Skipped(SkipReason::DetailsMissing));
        }
    };
    if !detail.has_bibliography() {
        tracing::warn!(book_id, "Title or author still empty, skipping description");
        return Ok(JobOutcome::Skipped(SkipReason::IncompleteDetails));
    }
    if !detail.description.is_empty() && !detail.subject.is_empty() {
        return Ok(JobOutcome::Skipped(SkipReason::AlreadyDescribed));
    }

    let call_timeout = state.config.call_timeout();

    if detail.description.is_empty() {
        let description = with_call_timeout(
            call_timeout,
            "generating description",
            state.inference.describe(&detail.title, &detail.author),
        )
        .await
        .map_err(into_job_error)?;
        let description = normalize_description(&description);
        let updated = state
            .db
            .details
            .backfill_description(book_id, &description)
            .await
            .map_err(into_job_error)?;
        tracing::info!(book_id, updated, "Description generated");
    }

    if detail.subject.is_empty() {
        let subject = with_call_timeout(
            call_timeout,
            "generating subject",
            state.inference.subject(&detail.title, &detail.author),
        )
        .await
        .map_err(into_job_error)?;
        let updated = state
            .db
            .details
            .backfill_subject(book_id, subject.trim())
            .await
            .map_err(into_job_error)?;
        tracing::info!(book_id, updated, "Subject generated");
    }

    Ok(JobOutcome::Completed)
}
