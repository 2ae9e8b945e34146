//! Collaborator capability traits
//!
//! The pipeline talks to every external system through a narrow trait so the
//! orchestration code can be exercised with in-crate fakes. Concrete clients
//! live in `libroteca-services` (HTTP) and `libroteca-extract` (subprocess).

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Book, SourceCandidate, UploaderSource};

/// Display metadata for an uploader, fetched once when a new identity is seen
/// and again during bulk avatar refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploaderProfile {
    pub uploader_id: String,
    pub name: String,
    pub avatar: String,
}

/// Structured bibliographic output from the inference collaborator.
///
/// Empty strings mean "the model did not produce this field"; merge logic
/// treats them as absent and falls back to embedded PDF metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibliographicFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subject: String,
}

impl BibliographicFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.author.is_empty()
            && self.description.is_empty()
            && self.subject.is_empty()
    }
}

/// A message/file source that yields document candidates: a chat channel or a
/// repository tree. Pagination is the adapter's business; callers only state
/// the newest timestamp they already know about.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Which uploader namespace this source populates.
    fn kind(&self) -> UploaderSource;

    /// Candidates newer than `since` (all candidates when `None`).
    async fn fetch_candidates(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SourceCandidate>, AppError>;

    /// A currently-fetchable URL for the record's stored locator. Chat
    /// attachment links expire, so adapters may re-derive a fresh link from
    /// the origin reference. `None` means the source no longer has the file.
    async fn resolve_download_url(&self, book: &Book) -> Result<Option<String>, AppError>;

    /// Display profile for an uploader id; `None` for deleted/banned accounts.
    async fn fetch_profile(&self, uploader_id: &str) -> Result<Option<UploaderProfile>, AppError>;
}

/// Renders page 1 of a PDF already sitting in the scratch directory.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// PNG bytes at the canonical cover size.
    async fn rasterize_first_page(&self, pdf_path: &Path) -> Result<Vec<u8>, AppError>;
}

/// Image-hosting collaborator for rendered covers.
#[async_trait]
pub trait CoverHost: Send + Sync {
    /// Upload PNG bytes, returning the hosted locator.
    async fn upload_image(&self, png: &[u8]) -> Result<String, AppError>;
}

/// Generative-AI collaborator.
#[async_trait]
pub trait Inference: Send + Sync {
    /// Infer `{title, author, description, subject}` from a text excerpt.
    /// A response that cannot be decoded surfaces as
    /// [`AppError::InferenceParse`], distinct from transport failures.
    async fn infer_bibliographic_fields(
        &self,
        excerpt: &str,
    ) -> Result<BibliographicFields, AppError>;

    /// Short free-text description (about fifty words) for a known work.
    async fn describe(&self, title: &str, author: &str) -> Result<String, AppError>;

    /// One-or-two-word subject classification for a known work.
    async fn subject(&self, title: &str, author: &str) -> Result<String, AppError>;

    /// Keyword suggestions, biased toward reusing `vocabulary` entries.
    /// An empty list is a valid outcome; a reply that cannot be parsed as a
    /// list surfaces as [`AppError::KeywordParse`].
    async fn keywords(
        &self,
        title: &str,
        author: &str,
        vocabulary: &[String],
    ) -> Result<Vec<String>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bibliographic_fields_empty() {
        assert!(BibliographicFields::default().is_empty());
        let fields = BibliographicFields {
            title: "El Aleph".to_string(),
            ..Default::default()
        };
        assert!(!fields.is_empty());
    }

    #[test]
    fn test_bibliographic_fields_tolerates_missing_keys() {
        // Models frequently omit fields they could not infer.
        let fields: BibliographicFields =
            serde_json::from_str(r#"{"title": "Ficciones", "author": "Borges"}"#).unwrap();
        assert_eq!(fields.title, "Ficciones");
        assert_eq!(fields.description, "");
        assert_eq!(fields.subject, "");
    }
}
