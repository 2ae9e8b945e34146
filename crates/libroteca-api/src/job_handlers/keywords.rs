//! AI keyword generation job.

use libroteca_core::constants::MAX_KEYWORDS_PER_BOOK;
use libroteca_core::models::{JobOutcome, SkipReason};
use libroteca_core::JobError;

use crate::services::with_call_timeout;
use crate::state::AppState;

use super::into_job_error;

/// Generate and associate keywords for a record that has none yet. The
/// existing vocabulary rides along in the prompt so the model reuses terms
/// instead of minting near-duplicates.
pub async fn run(state: &AppState, book_id: i64) -> Result<JobOutcome, JobError> {
    if state
        .db
        .keywords
        .has_associations(book_id)
        .await
        .map_err(into_job_error)?
    {
        return Ok(JobOutcome::Skipped(SkipReason::AlreadyTagged));
    }

    let detail = match state
        .db
        .details
        .find_by_book_id(book_id)
        .await
        .map_err(into_job_error)?
    {
        Some(detail) => detail,
        None => {
            tracing::warn!(book_id, "No detail row yet, skipping keywords");
            return Ok(JobOutcome::Skipped(SkipReason::DetailsMissing));
        }
    };
    if !detail.has_bibliography() {
        tracing::warn!(book_id, "Title or author still empty, skipping keywords");
        return Ok(JobOutcome::Skipped(SkipReason::IncompleteDetails));
    }

    let vocabulary = state
        .db
        .keywords
        .vocabulary()
        .await
        .map_err(into_job_error)?;
    let keywords = with_call_timeout(
        state.config.call_timeout(),
        "generating keywords",
        state
            .inference
            .keywords(&detail.title, &detail.author, &vocabulary),
    )
    .await
    .map_err(into_job_error)?;

    // An empty list is a valid reply; the record simply stays untagged.
    let mut associated = 0;
    for keyword in keywords.iter().take(MAX_KEYWORDS_PER_BOOK) {
        let keyword_id = state
            .db
            .keywords
            .ensure(keyword)
            .await
            .map_err(into_job_error)?;
        state
            .db
            .keywords
            .associate(book_id, keyword_id)
            .await
            .map_err(into_job_error)?;
        associated += 1;
    }

    tracing::info!(book_id, associated, "Keywords stored");
    Ok(JobOutcome::Completed)
}
