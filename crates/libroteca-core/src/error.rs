//! Error types module
//!
//! This module provides the core error types used throughout libroteca.
//! All errors are unified under the `AppError` enum which can represent
//! database, queue, extraction, and collaborator errors.
//!
//! `MalformedPdf` is special: it is the one content error the enrichment
//! worker converts into a blacklist mutation instead of a retry, so it must
//! carry the record id all the way up from the extraction pipeline.

use std::io;

use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like collaborator hiccups
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[error("Malformed PDF for record {book_id}")]
    MalformedPdf { book_id: i64 },

    #[error("PDF processing error: {0}")]
    PdfProcessing(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Rasterization error: {0}")]
    Rasterize(String),

    #[error("Image host error: {0}")]
    ImageHost(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Inference response parse error: {0}")]
    InferenceParse(String),

    #[error("Keyword list parse error: {0}")]
    KeywordParse(String),

    #[error("Timed out while {operation}")]
    Timeout { operation: String },

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Source adapter error: {0}")]
    SourceAdapter(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

// Error conversion implementations following Rust best practices
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
/// Reduces duplication in the ErrorMetadata impl; client_message stays per-variant for dynamic content.
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, true, LogLevel::Error),
        AppError::MalformedPdf { .. } => (422, "MALFORMED_PDF", false, false, LogLevel::Warn),
        AppError::PdfProcessing(_) => (422, "PDF_PROCESSING_ERROR", false, false, LogLevel::Warn),
        AppError::Download(_) => (502, "DOWNLOAD_ERROR", true, false, LogLevel::Warn),
        AppError::Rasterize(_) => (500, "RASTERIZE_ERROR", true, false, LogLevel::Warn),
        AppError::ImageHost(_) => (502, "IMAGE_HOST_ERROR", true, false, LogLevel::Warn),
        AppError::Inference(_) => (502, "INFERENCE_ERROR", true, true, LogLevel::Warn),
        AppError::InferenceParse(_) => (502, "INFERENCE_PARSE_ERROR", false, false, LogLevel::Warn),
        AppError::KeywordParse(_) => (502, "KEYWORD_PARSE_ERROR", false, false, LogLevel::Warn),
        AppError::Timeout { .. } => (504, "TIMEOUT", true, false, LogLevel::Warn),
        AppError::Queue(_) => (503, "QUEUE_ERROR", true, true, LogLevel::Error),
        AppError::SourceAdapter(_) => (502, "SOURCE_ADAPTER_ERROR", true, false, LogLevel::Warn),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, false, LogLevel::Debug),
        AppError::Config(_) => (500, "CONFIG_ERROR", false, true, LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::MalformedPdf { .. } => "MalformedPdf",
            AppError::PdfProcessing(_) => "PdfProcessing",
            AppError::Download(_) => "Download",
            AppError::Rasterize(_) => "Rasterize",
            AppError::ImageHost(_) => "ImageHost",
            AppError::Inference(_) => "Inference",
            AppError::InferenceParse(_) => "InferenceParse",
            AppError::KeywordParse(_) => "KeywordParse",
            AppError::Timeout { .. } => "Timeout",
            AppError::Queue(_) => "Queue",
            AppError::SourceAdapter(_) => "SourceAdapter",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Config(_) => "Config",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::MalformedPdf { book_id } => {
                format!("Source file for record {} is not a valid PDF", book_id)
            }
            AppError::PdfProcessing(ref msg) => msg.clone(),
            AppError::Download(ref msg) => msg.clone(),
            AppError::Rasterize(_) => "Failed to render cover image".to_string(),
            AppError::ImageHost(_) => "Failed to upload cover image".to_string(),
            AppError::Inference(_) => "Inference service unavailable".to_string(),
            AppError::InferenceParse(_) => "Inference service returned an unusable response".to_string(),
            AppError::KeywordParse(_) => "Keyword list could not be parsed".to_string(),
            AppError::Timeout { operation } => format!("Timed out while {}", operation),
            AppError::Queue(_) => "Job queue unavailable".to_string(),
            AppError::SourceAdapter(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Config(_) => "Service misconfigured".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_pdf_carries_record_id() {
        let err = AppError::MalformedPdf { book_id: 42 };
        assert!(err.to_string().contains("42"));
        assert_eq!(err.error_code(), "MALFORMED_PDF");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_database_error_is_sensitive() {
        let err = AppError::Database(SqlxError::RowNotFound);
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to access database");
    }

    #[test]
    fn test_parse_failures_are_not_recoverable() {
        let err = AppError::InferenceParse("missing title field".to_string());
        assert!(!err.is_recoverable());
        let err = AppError::KeywordParse("degenerate single element".to_string());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_transient_collaborator_errors_are_recoverable() {
        assert!(AppError::Download("timeout".into()).is_recoverable());
        assert!(AppError::Inference("503".into()).is_recoverable());
        assert!(AppError::Queue("connection reset".into()).is_recoverable());
        let timeout = AppError::Timeout {
            operation: "downloading source file".to_string(),
        };
        assert!(timeout.is_recoverable());
        assert_eq!(timeout.http_status_code(), 504);
    }

    #[test]
    fn test_from_anyhow_preserves_message() {
        let err: AppError = anyhow::anyhow!("broken pipe").into();
        match err {
            AppError::InternalWithSource { ref message, .. } => {
                assert_eq!(message, "broken pipe")
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_detailed_message_includes_chain() {
        let root = anyhow::anyhow!("connection refused");
        let err: AppError = root.context("fetching channel messages").into();
        let details = err.detailed_message();
        assert!(details.contains("Caused by"));
        assert!(details.contains("connection refused"));
    }

    #[test]
    fn test_error_type_names() {
        assert_eq!(AppError::MalformedPdf { book_id: 1 }.error_type(), "MalformedPdf");
        assert_eq!(AppError::NotFound("book 9".into()).error_type(), "NotFound");
    }
}
