use libroteca_core::{models::BookDetail, AppError};
use sqlx::{PgPool, Postgres};

/// Repository for enrichment details (1:1 with books, created lazily)
#[derive(Clone)]
pub struct DetailRepository {
    pool: PgPool,
}

impl DetailRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the detail row for a book. Extraction calls this on
    /// every successful run, so re-running a DETAILS job is harmless.
    #[tracing::instrument(skip(self, detail), fields(db.table = "book_details", db.operation = "upsert", db.record_id = %detail.book_id))]
    pub async fn upsert(&self, detail: &BookDetail) -> Result<BookDetail, AppError> {
        let saved = sqlx::query_as::<Postgres, BookDetail>(
            r#"
            INSERT INTO book_details (book_id, title, author, subject, description, cover_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (book_id) DO UPDATE SET
                title = EXCLUDED.title,
                author = EXCLUDED.author,
                subject = EXCLUDED.subject,
                description = EXCLUDED.description,
                cover_image = EXCLUDED.cover_image
            RETURNING book_id, title, author, subject, description, cover_image
            "#,
        )
        .bind(detail.book_id)
        .bind(&detail.title)
        .bind(&detail.author)
        .bind(&detail.subject)
        .bind(&detail.description)
        .bind(&detail.cover_image)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self), fields(db.table = "book_details", db.operation = "select", db.record_id = %book_id))]
    pub async fn find_by_book_id(&self, book_id: i64) -> Result<Option<BookDetail>, AppError> {
        let detail = sqlx::query_as::<Postgres, BookDetail>(
            "SELECT book_id, title, author, subject, description, cover_image FROM book_details WHERE book_id = $1",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(detail)
    }

    /// Fill in a description only when it is still empty and extraction
    /// already produced a title and author. Returns whether a row changed;
    /// false means the guard rejected the write, which makes the AI job a
    /// no-op on redelivery.
    #[tracing::instrument(skip(self, description), fields(db.table = "book_details", db.operation = "update", db.record_id = %book_id))]
    pub async fn backfill_description(
        &self,
        book_id: i64,
        description: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE book_details SET description = $2
            WHERE book_id = $1 AND description = '' AND title <> '' AND author <> ''
            "#,
        )
        .bind(book_id)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Same guard shape as [`Self::backfill_description`], for the subject.
    #[tracing::instrument(skip(self, subject), fields(db.table = "book_details", db.operation = "update", db.record_id = %book_id))]
    pub async fn backfill_subject(&self, book_id: i64, subject: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE book_details SET subject = $2
            WHERE book_id = $1 AND subject = '' AND title <> '' AND author <> ''
            "#,
        )
        .bind(book_id)
        .bind(subject)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
