use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::uploader::UploaderSource;

/// A stored document record. The `file` locator is unique across all rows;
/// the deduplicator checks it before insert and the store enforces it with a
/// uniqueness constraint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub uploader_id: String,
    pub file: String,
    /// Message id or tree path at the origin, used to re-derive fresh
    /// download links. Absent for legacy rows.
    pub origin_ref: Option<String>,
    /// When the document appeared at the source (not when it was ingested).
    pub date: DateTime<Utc>,
    pub downloads: i32,
    pub blacklisted: bool,
    pub created_at: DateTime<Utc>,
}

/// Enrichment output, 1:1 with a book and created lazily by the extraction
/// pipeline. Empty strings mean "not yet known"; none of the fields are null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookDetail {
    pub book_id: i64,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub description: String,
    pub cover_image: String,
}

impl BookDetail {
    pub fn empty(book_id: i64) -> Self {
        Self {
            book_id,
            title: String::new(),
            author: String::new(),
            subject: String::new(),
            description: String::new(),
            cover_image: String::new(),
        }
    }

    /// AI back-fill jobs only make sense once extraction produced a usable
    /// title and author.
    pub fn has_bibliography(&self) -> bool {
        !self.title.is_empty() && !self.author.is_empty()
    }
}

/// An unpersisted document reference discovered from a source, prior to
/// dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub uploader_id: String,
    pub file: String,
    pub origin_ref: Option<String>,
    pub date: DateTime<Utc>,
    pub source: UploaderSource,
}

/// A book joined with its (possibly absent) detail row, for listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookWithDetail {
    pub id: i64,
    pub uploader_id: String,
    pub file: String,
    pub date: DateTime<Utc>,
    pub downloads: i32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_detail() {
        let detail = BookDetail::empty(7);
        assert_eq!(detail.book_id, 7);
        assert_eq!(detail.title, "");
        assert_eq!(detail.cover_image, "");
        assert!(!detail.has_bibliography());
    }

    #[test]
    fn test_has_bibliography_requires_both_fields() {
        let mut detail = BookDetail::empty(1);
        detail.title = "Rayuela".to_string();
        assert!(!detail.has_bibliography());
        detail.author = "Julio Cortázar".to_string();
        assert!(detail.has_bibliography());
    }
}
