//! Detail extraction job.
//!
//! Resolves a fetchable URL for the record, runs the PDF pipeline, and
//! upserts the resulting detail row. A malformed source file is the one
//! failure handled here instead of bubbling up: the record is blacklisted
//! and the job reports a successful `Blacklisted` outcome.

use libroteca_core::models::{Book, JobOutcome, SkipReason};
use libroteca_core::{AppError, JobError};

use crate::services::with_call_timeout;
use crate::state::AppState;

use super::into_job_error;

/// Extract and store details for one record.
pub async fn run(state: &AppState, book_id: i64) -> Result<JobOutcome, JobError> {
    let book = match state
        .db
        .books
        .find_by_id(book_id)
        .await
        .map_err(into_job_error)?
    {
        Some(book) => book,
        None => {
            tracing::warn!(book_id, "Record gone, skipping detail extraction");
            return Ok(JobOutcome::Skipped(SkipReason::RecordMissing));
        }
    };

    let url = resolve_download_url(state, &book).await?;

    match state.extractor.extract(&book, &url).await {
        Ok(detail) => {
            state
                .db
                .details
                .upsert(&detail)
                .await
                .map_err(into_job_error)?;
            Ok(JobOutcome::Completed)
        }
        Err(AppError::MalformedPdf { book_id }) => {
            tracing::warn!(book_id, "Malformed source file, blacklisting record");
            state
                .db
                .books
                .blacklist(book_id)
                .await
                .map_err(into_job_error)?;
            Ok(JobOutcome::Blacklisted)
        }
        Err(e) => Err(into_job_error(e)),
    }
}

/// A currently-fetchable URL for the record's stored locator, resolved
/// through the adapter that owns the uploader's namespace.
async fn resolve_download_url(state: &AppState, book: &Book) -> Result<String, JobError> {
    let uploader = state
        .db
        .uploaders
        .find_by_id(&book.uploader_id)
        .await
        .map_err(into_job_error)?
        .ok_or_else(|| {
            JobError::unrecoverable(AppError::NotFound(format!(
                "Uploader {} not found for record {}",
                book.uploader_id, book.id
            )))
        })?;
    let source = state.source_for(uploader.source).ok_or_else(|| {
        JobError::unrecoverable(AppError::Config(format!(
            "No source adapter registered for {}",
            uploader.source
        )))
    })?;

    let resolved = with_call_timeout(
        state.config.call_timeout(),
        "resolving download url",
        source.resolve_download_url(book),
    )
    .await
    .map_err(into_job_error)?;

    // Attachment links can lag behind the message fetch. A missing link is
    // transient; bounded retries decide when to give up.
    resolved.ok_or_else(|| {
        JobError::recoverable(AppError::SourceAdapter(format!(
            "No download url for record {}",
            book.id
        )))
    })
}
