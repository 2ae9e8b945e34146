use std::collections::HashSet;

use libroteca_core::{
    models::{NewUploader, Uploader},
    AppError,
};
use sqlx::{PgPool, Postgres};

/// Repository for uploader identities
#[derive(Clone)]
pub struct UploaderRepository {
    pool: PgPool,
}

impl UploaderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Which of `ids` already exist. The registry only fetches profiles for
    /// the unknown remainder.
    #[tracing::instrument(skip(self, ids), fields(db.table = "uploaders", db.operation = "select", candidates = ids.len()))]
    pub async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, AppError> {
        let rows = sqlx::query_scalar::<Postgres, String>(
            "SELECT uploader_id FROM uploaders WHERE uploader_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Insert-or-ignore keyed on identity, so redelivering the same candidate
    /// batch after a crash neither fails nor duplicates.
    #[tracing::instrument(skip(self, uploaders), fields(db.table = "uploaders", db.operation = "insert", batch = uploaders.len()))]
    pub async fn save_uploaders(&self, uploaders: &[NewUploader]) -> Result<u64, AppError> {
        let mut saved = 0;
        for uploader in uploaders {
            let result = sqlx::query(
                r#"
                INSERT INTO uploaders (uploader_id, name, avatar, source)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (uploader_id) DO NOTHING
                "#,
            )
            .bind(&uploader.uploader_id)
            .bind(&uploader.name)
            .bind(&uploader.avatar)
            .bind(uploader.source)
            .execute(&self.pool)
            .await?;
            saved += result.rows_affected();
        }
        Ok(saved)
    }

    /// The details handler reads the uploader row to learn which source a
    /// record came from before resolving its download URL.
    #[tracing::instrument(skip(self), fields(db.table = "uploaders", db.operation = "select", db.record_id = %uploader_id))]
    pub async fn find_by_id(&self, uploader_id: &str) -> Result<Option<Uploader>, AppError> {
        let uploader = sqlx::query_as::<Postgres, Uploader>(
            "SELECT uploader_id, name, avatar, source, created_at FROM uploaders WHERE uploader_id = $1",
        )
        .bind(uploader_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(uploader)
    }

    #[tracing::instrument(skip(self), fields(db.table = "uploaders", db.operation = "select"))]
    pub async fn all(&self) -> Result<Vec<Uploader>, AppError> {
        let uploaders = sqlx::query_as::<Postgres, Uploader>(
            "SELECT uploader_id, name, avatar, source, created_at FROM uploaders ORDER BY uploader_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(uploaders)
    }

    /// Used by the bulk avatar refresh; callers diff before writing so this
    /// only runs for rows that actually changed.
    #[tracing::instrument(skip(self, avatar), fields(db.table = "uploaders", db.operation = "update", db.record_id = %uploader_id))]
    pub async fn update_avatar(&self, uploader_id: &str, avatar: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE uploaders SET avatar = $2 WHERE uploader_id = $1")
            .bind(uploader_id)
            .bind(avatar)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
