use std::collections::HashSet;

use chrono::{DateTime, Utc};
use libroteca_core::{
    models::{Book, BookWithDetail, SourceCandidate},
    AppError,
};
use sqlx::{PgPool, Postgres};

/// Repository for document records
#[derive(Clone)]
pub struct BookRepository {
    pool: PgPool,
}

impl BookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bulk insert an already-deduplicated, uploader-resolved candidate set.
    ///
    /// Insert-or-ignore on the `file` uniqueness key, so a redelivered batch
    /// (crash before ack) neither fails nor duplicates. Returns how many rows
    /// were actually inserted.
    #[tracing::instrument(skip(self, candidates), fields(db.table = "books", db.operation = "insert", batch = candidates.len()))]
    pub async fn save_books(&self, candidates: &[SourceCandidate]) -> Result<u64, AppError> {
        let mut saved = 0;
        for candidate in candidates {
            let result = sqlx::query(
                r#"
                INSERT INTO books (uploader_id, file, origin_ref, date)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (file) DO NOTHING
                "#,
            )
            .bind(&candidate.uploader_id)
            .bind(&candidate.file)
            .bind(&candidate.origin_ref)
            .bind(candidate.date)
            .execute(&self.pool)
            .await?;
            saved += result.rows_affected();
        }
        Ok(saved)
    }

    /// File locators from `files` that are already stored, blacklisted rows
    /// included. The deduplicator's one read query.
    #[tracing::instrument(skip(self, files), fields(db.table = "books", db.operation = "select", candidates = files.len()))]
    pub async fn existing_files(&self, files: &[String]) -> Result<HashSet<String>, AppError> {
        let rows =
            sqlx::query_scalar::<Postgres, String>("SELECT file FROM books WHERE file = ANY($1)")
                .bind(files)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// Non-blacklisted books with no detail row: the canonical work-queue
    /// source of truth for DETAILS jobs.
    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "select"))]
    pub async fn find_missing_details(&self) -> Result<Vec<Book>, AppError> {
        let books = sqlx::query_as::<Postgres, Book>(
            r#"
            SELECT b.id, b.uploader_id, b.file, b.origin_ref, b.date, b.downloads, b.blacklisted, b.created_at
            FROM books b
            LEFT JOIN book_details d ON d.book_id = b.id
            WHERE d.book_id IS NULL AND b.blacklisted = FALSE
            ORDER BY b.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "select", db.record_id = %id))]
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Book>, AppError> {
        let book = sqlx::query_as::<Postgres, Book>(
            "SELECT id, uploader_id, file, origin_ref, date, downloads, blacklisted, created_at FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    /// Permanently exclude a record whose source file is malformed.
    /// Idempotent: repeat calls leave the flag true and return Ok.
    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "update", db.record_id = %id))]
    pub async fn blacklist(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE books SET blacklisted = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            tracing::debug!(book_id = id, "Blacklist requested for unknown record");
        }
        Ok(())
    }

    /// Monotonic download counter, bumped by the download endpoint.
    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "update", db.record_id = %id))]
    pub async fn increment_downloads(&self, id: i64) -> Result<i32, AppError> {
        let downloads = sqlx::query_scalar::<Postgres, i32>(
            "UPDATE books SET downloads = downloads + 1 WHERE id = $1 RETURNING downloads",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        downloads.ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    /// Newest source timestamp we already ingested; the refresh pass fetches
    /// candidates strictly newer than this.
    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "select"))]
    pub async fn latest_date(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let latest = sqlx::query_scalar::<Postgres, Option<DateTime<Utc>>>(
            "SELECT MAX(date) FROM books",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }

    /// Default listing: non-blacklisted books joined with whatever details
    /// exist, newest first.
    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "select"))]
    pub async fn list_with_details(&self) -> Result<Vec<BookWithDetail>, AppError> {
        let books = sqlx::query_as::<Postgres, BookWithDetail>(
            r#"
            SELECT b.id, b.uploader_id, b.file, b.date, b.downloads,
                   d.title, d.author, d.subject, d.description, d.cover_image
            FROM books b
            LEFT JOIN book_details d ON d.book_id = b.id
            WHERE b.blacklisted = FALSE
            ORDER BY b.date DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Books whose detail row has a title and author but still has neither
    /// subject nor description. Feed for the ai-description fan-out; rows
    /// without bibliography are left for a future details re-run instead.
    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "select"))]
    pub async fn find_undescribed(&self) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, i64>(
            r#"
            SELECT b.id
            FROM books b
            JOIN book_details d ON d.book_id = b.id
            WHERE b.blacklisted = FALSE
              AND d.title <> '' AND d.author <> ''
              AND d.subject = '' AND d.description = ''
            ORDER BY b.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Books with a titled detail row but zero keyword associations.
    /// Feed for the ai-keywords fan-out.
    #[tracing::instrument(skip(self), fields(db.table = "books", db.operation = "select"))]
    pub async fn find_untagged(&self) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, i64>(
            r#"
            SELECT b.id
            FROM books b
            JOIN book_details d ON d.book_id = b.id
            LEFT JOIN book_keywords bk ON bk.book_id = b.id
            WHERE b.blacklisted = FALSE
              AND d.title <> '' AND d.author <> ''
              AND bk.book_id IS NULL
            ORDER BY b.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
