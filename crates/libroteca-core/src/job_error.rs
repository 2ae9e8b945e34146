//! Job execution error types
//!
//! Queue deliveries fail in two ways: transiently (the download link was
//! slow, the inference endpoint returned a 503) or permanently (the message
//! body cannot be decoded, a reserved job type slipped in). The worker needs
//! to tell them apart to choose between republish-with-retry-header and the
//! dead-letter queue, so handlers wrap failures in [`JobError`] with a
//! recoverable flag.
//!
//! Malformed source files are NOT routed through here: the details handler
//! catches [`crate::AppError::MalformedPdf`] itself, blacklists the record
//! and reports a successful `Blacklisted` outcome so the delivery is acked.

use std::fmt;

/// Job execution error that can be either recoverable or unrecoverable
#[derive(Debug)]
pub struct JobError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl JobError {
    /// Create a new unrecoverable job error
    ///
    /// Unrecoverable errors are dead-lettered immediately without retrying.
    /// Use this for errors like:
    /// - Undecodable message bodies
    /// - Job types the dispatcher cannot handle
    /// - Missing configuration that cannot appear between deliveries
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Create a new recoverable job error
    ///
    /// Recoverable errors are republished with an incremented retry header
    /// until the retry cap, then dead-lettered. Use this for errors like:
    /// - Transient network failures and timeouts
    /// - A download link that could not be resolved right now
    /// - Collaborator rate limiting
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    /// Check if this error is recoverable (should be redelivered)
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Get the inner error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Consume self and return the inner error
    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for JobError {
    /// Default conversion from anyhow::Error creates a recoverable error
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

// Note: From<JobError> for anyhow::Error is automatically implemented by anyhow
// via its blanket implementation for any type that implements std::error::Error

/// Extension trait for Result to mark job errors without boilerplate
pub trait JobResultExt<T> {
    /// Mark this result as unrecoverable on error
    fn unrecoverable(self) -> Result<T, JobError>;

    /// Mark this result as recoverable on error
    fn recoverable(self) -> Result<T, JobError>;
}

impl<T, E: Into<anyhow::Error>> JobResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, JobError> {
        self.map_err(|e| JobError::unrecoverable(e.into()))
    }

    fn recoverable(self) -> Result<T, JobError> {
        self.map_err(|e| JobError::recoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_error() {
        let err = JobError::unrecoverable(anyhow::anyhow!("Unknown job type 9"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("Unknown job type 9"));
    }

    #[test]
    fn test_recoverable_error() {
        let err = JobError::recoverable(anyhow::anyhow!("Download timed out"));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("Download timed out"));
    }

    #[test]
    fn test_from_anyhow() {
        let err: JobError = anyhow::anyhow!("Some error").into();
        assert!(err.is_recoverable(), "Default should be recoverable");
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("Undecodable body"));
        let job_result = result.unrecoverable();
        assert!(!job_result.unwrap_err().is_recoverable());

        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("No download url yet"));
        let job_result = result.recoverable();
        assert!(job_result.unwrap_err().is_recoverable());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        // The worker receives anyhow::Error from the dispatch trait and
        // downcasts to decide the retry path.
        let err: anyhow::Error = JobError::unrecoverable(anyhow::anyhow!("boom")).into();
        let job_err = err.downcast_ref::<JobError>().unwrap();
        assert!(!job_err.is_recoverable());
    }
}
