//! PostgreSQL implementation of the storage trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::entities::{ShortenedUrl, UserId, UserUrl};
use crate::domain::repositories::{DeleteBatch, Storage, WRITE_CHUNK_SIZE};
use crate::error::AppError;

/// PostgreSQL storage for shortened URLs and ownership links.
///
/// Each logical write runs in its own transaction; isolation between
/// concurrent writers is left to the database.
pub struct PgStorage {
    pool: Arc<PgPool>,
}

impl PgStorage {
    /// Creates a storage over an existing connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Connects to the database and applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Timeout`] if no connection could be acquired in
    /// time, [`AppError::Internal`] on connection or migration failure.
    pub async fn connect(
        dsn: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(dsn)
            .await?;
        tracing::info!(max_connections, "Connected to database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::internal("Failed to migrate", json!({ "reason": e.to_string() })))?;
        tracing::info!("Database migrations applied");

        Ok(Self::new(Arc::new(pool)))
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn write_shortened_url(&self, url: &ShortenedUrl) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO shortened_urls (uuid, short_url, original_url, correlation_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(url.uuid)
        .bind(&url.short_url)
        .bind(&url.original_url)
        .bind(&url.correlation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn read_shortened_url(&self, key: &str) -> Result<Option<ShortenedUrl>, AppError> {
        let row = sqlx::query_as::<_, ShortenedUrl>(
            r#"
            SELECT uuid, short_url, original_url, correlation_id, is_deleted
            FROM shortened_urls
            WHERE short_url = $1 OR original_url = $1
            ORDER BY (short_url = $1) DESC
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn read_shortened_url_by_original(
        &self,
        original_url: &str,
    ) -> Result<Option<ShortenedUrl>, AppError> {
        let row = sqlx::query_as::<_, ShortenedUrl>(
            r#"
            SELECT uuid, short_url, original_url, correlation_id, is_deleted
            FROM shortened_urls
            WHERE original_url = $1
            "#,
        )
        .bind(original_url)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn write_batch_shortened_urls(&self, urls: &[ShortenedUrl]) -> Result<(), AppError> {
        if urls.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on error rolls back every chunk.
        let mut tx = self.pool.begin().await?;

        for chunk in urls.chunks(WRITE_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO shortened_urls (uuid, short_url, original_url, correlation_id) ",
            );
            builder.push_values(chunk, |mut row, url| {
                row.push_bind(url.uuid)
                    .push_bind(url.short_url.clone())
                    .push_bind(url.original_url.clone())
                    .push_bind(url.correlation_id.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_user_url(&self, user_url: &UserUrl) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO user_urls (uuid, user_id, shortened_url_uuid)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, shortened_url_uuid) DO NOTHING
            "#,
        )
        .bind(user_url.uuid)
        .bind(user_url.user_id)
        .bind(user_url.shortened_url_uuid)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn read_user_urls(&self, user_id: UserId) -> Result<Vec<ShortenedUrl>, AppError> {
        let rows = sqlx::query_as::<_, ShortenedUrl>(
            r#"
            SELECT su.uuid, su.short_url, su.original_url, su.correlation_id, su.is_deleted
            FROM shortened_urls su
            JOIN user_urls uu ON su.uuid = uu.shortened_url_uuid
            WHERE uu.user_id = $1
            ORDER BY uu.created_at, uu.uuid
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn delete_bulk(&self, batch: DeleteBatch) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0u64;

        for (user_id, keys) in batch {
            let result = sqlx::query(
                r#"
                UPDATE shortened_urls su SET is_deleted = TRUE
                FROM user_urls uu
                WHERE su.uuid = uu.shortened_url_uuid
                  AND uu.user_id = $1
                  AND su.short_url = ANY($2)
                  AND su.is_deleted = FALSE
                "#,
            )
            .bind(user_id)
            .bind(keys)
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        tx.commit().await?;
        tracing::debug!(affected, "Marked shortened URLs deleted");
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}
