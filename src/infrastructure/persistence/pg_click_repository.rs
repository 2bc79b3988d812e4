//! PostgreSQL implementation of click repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use super::pg_url_repository::{from_db_id, to_db_id};
use crate::domain::entities::{Click, UrlAnalytics};
use crate::domain::repositories::ClickRepository;
use crate::error::AppError;

/// PostgreSQL repository for click tracking and analytics.
pub struct PgClickRepository {
    pool: Arc<PgPool>,
}

impl PgClickRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClickRepository for PgClickRepository {
    async fn record_click(&self, url_id: u64) -> Result<Click, AppError> {
        let (id, url_id, created_at): (i64, i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO clicks (url_id)
            VALUES ($1)
            RETURNING id, url_id, created_at
            "#,
        )
        .bind(to_db_id(url_id)?)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(Click::new(id, from_db_id(url_id)?, created_at))
    }

    async fn aggregate_clicks(&self) -> Result<Vec<UrlAnalytics>, AppError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT u.short_code, u.long_url, COUNT(c.id) AS click_count
            FROM urls u
            LEFT JOIN clicks c ON c.url_id = u.id
            GROUP BY u.id, u.short_code, u.long_url
            ORDER BY click_count DESC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(short_code, long_url, click_count)| UrlAnalytics {
                short_code,
                long_url,
                click_count,
            })
            .collect())
    }

    async fn count_clicks(&self, url_id: u64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clicks WHERE url_id = $1")
            .bind(to_db_id(url_id)?)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}
