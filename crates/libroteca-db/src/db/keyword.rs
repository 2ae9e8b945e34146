use libroteca_core::AppError;
use sqlx::{PgPool, Postgres};

/// Repository for the keyword vocabulary and book associations
#[derive(Clone)]
pub struct KeywordRepository {
    pool: PgPool,
}

impl KeywordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The idempotence guard for keyword enrichment: a record with any
    /// existing association is skipped entirely.
    #[tracing::instrument(skip(self), fields(db.table = "book_keywords", db.operation = "select", db.record_id = %book_id))]
    pub async fn has_associations(&self, book_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM book_keywords WHERE book_id = $1)",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Every known keyword text, offered to the inference collaborator so it
    /// reuses existing tags instead of inventing near-duplicates.
    #[tracing::instrument(skip(self), fields(db.table = "keywords", db.operation = "select"))]
    pub async fn vocabulary(&self) -> Result<Vec<String>, AppError> {
        let keywords =
            sqlx::query_scalar::<Postgres, String>("SELECT keyword FROM keywords ORDER BY keyword")
                .fetch_all(&self.pool)
                .await?;
        Ok(keywords)
    }

    /// Insert a keyword if new, returning its id either way.
    #[tracing::instrument(skip(self), fields(db.table = "keywords", db.operation = "upsert"))]
    pub async fn ensure(&self, keyword: &str) -> Result<i64, AppError> {
        // DO UPDATE instead of DO NOTHING so RETURNING also yields the id of
        // a pre-existing row.
        let id = sqlx::query_scalar::<Postgres, i64>(
            r#"
            INSERT INTO keywords (keyword)
            VALUES ($1)
            ON CONFLICT (keyword) DO UPDATE SET keyword = EXCLUDED.keyword
            RETURNING id
            "#,
        )
        .bind(keyword)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "book_keywords", db.operation = "insert", db.record_id = %book_id))]
    pub async fn associate(&self, book_id: i64, keyword_id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO book_keywords (book_id, keyword_id)
            VALUES ($1, $2)
            ON CONFLICT (book_id, keyword_id) DO NOTHING
            "#,
        )
        .bind(book_id)
        .bind(keyword_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
