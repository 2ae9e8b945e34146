//! Per-job-type handlers behind the queue dispatch.
//!
//! Handlers return [`JobOutcome`](libroteca_core::models::JobOutcome) for
//! informational results and [`JobError`] for failures, so the worker can tell
//! redeliverable failures from dead-letter ones.

pub mod description;
pub mod details;
pub mod keywords;
pub mod uploaders;

use libroteca_core::{AppError, ErrorMetadata, JobError};

/// Carry an [`AppError`]'s recoverability into the queue error contract.
pub(crate) fn into_job_error(err: AppError) -> JobError {
    if err.is_recoverable() {
        JobError::recoverable(err)
    } else {
        JobError::unrecoverable(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_stay_recoverable() {
        assert!(into_job_error(AppError::Download("503".into())).is_recoverable());
        assert!(into_job_error(AppError::Timeout {
            operation: "downloading source file".into()
        })
        .is_recoverable());
        assert!(into_job_error(AppError::SourceAdapter("no url yet".into())).is_recoverable());
    }

    #[test]
    fn test_permanent_errors_dead_letter() {
        assert!(!into_job_error(AppError::MalformedPdf { book_id: 7 }).is_recoverable());
        assert!(!into_job_error(AppError::NotFound("uploader u9".into())).is_recoverable());
        assert!(!into_job_error(AppError::InferenceParse("not json".into())).is_recoverable());
    }
}
