//! PostgreSQL implementation of URL repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

/// PostgreSQL repository for URL records.
///
/// Ids are stored as `BIGINT`, so only ids up to `i64::MAX` can be persisted.
pub struct PgUrlRepository {
    pool: Arc<PgPool>,
}

impl PgUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

pub(crate) fn to_db_id(id: u64) -> Result<i64, AppError> {
    i64::try_from(id)
        .map_err(|_| AppError::internal("Identifier exceeds storage range", json!({ "id": id })))
}

pub(crate) fn from_db_id(id: i64) -> Result<u64, AppError> {
    u64::try_from(id)
        .map_err(|_| AppError::internal("Negative identifier in storage", json!({ "id": id })))
}

#[async_trait]
impl UrlRepository for PgUrlRepository {
    async fn save(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError> {
        let id = to_db_id(new_record.id)?;

        let (id, short_code, long_url, created_at): (i64, String, String, DateTime<Utc>) =
            sqlx::query_as(
                r#"
            INSERT INTO urls (id, short_code, long_url)
            VALUES ($1, $2, $3)
            RETURNING id, short_code, long_url, created_at
            "#,
            )
            .bind(id)
            .bind(&new_record.short_code)
            .bind(&new_record.long_url)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(UrlRecord::new(
            from_db_id(id)?,
            short_code,
            long_url,
            created_at,
        ))
    }

    async fn load(&self, short_code: &str) -> Result<String, AppError> {
        sqlx::query_scalar::<_, String>("SELECT long_url FROM urls WHERE short_code = $1")
            .bind(short_code)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| {
                AppError::not_found("Short link not found", json!({ "code": short_code }))
            })
    }

    async fn resolve_id(&self, short_code: &str) -> Result<u64, AppError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM urls WHERE short_code = $1")
            .bind(short_code)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| {
                AppError::not_found("Short link not found", json!({ "code": short_code }))
            })?;

        from_db_id(id)
    }

    async fn max_id(&self) -> Result<u64, AppError> {
        let max = sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(id), 0) FROM urls")
            .fetch_one(self.pool.as_ref())
            .await?;

        from_db_id(max)
    }

    async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool.as_ref())
            .await
            .is_ok()
    }
}
