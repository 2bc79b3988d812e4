//! PostgreSQL connection pool setup.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use crate::config::Config;
use crate::infrastructure::startup::retry_startup;

/// Opens a pool and establishes its first connection (single attempt).
pub async fn connect_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Some(Duration::from_secs(config.db_idle_timeout)))
        .max_lifetime(Some(Duration::from_secs(config.db_max_lifetime)))
        .connect(&config.database_url)
        .await
}

/// Opens the pool, retrying within the configured startup budget.
///
/// # Errors
///
/// Returns the last connection error once every attempt has failed.
pub async fn connect_pool_with_retry(config: &Config) -> Result<PgPool, sqlx::Error> {
    retry_startup("database", config.startup_retry(), || connect_pool(config)).await
}
