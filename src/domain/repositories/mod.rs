//! Repository trait definitions for the durable store.
//!
//! Traits define the contract for data operations; implementations live in
//! `crate::infrastructure::persistence`. Mock implementations are generated
//! via `mockall` for unit tests.
//!
//! - [`UrlRepository`] - URL record save/load/resolve and allocator seeding
//! - [`ClickRepository`] - Click appends and analytics aggregation

pub mod click_repository;
pub mod url_repository;

pub use click_repository::ClickRepository;
pub use url_repository::UrlRepository;

use serde_json::json;
use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Default upper bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a store call, failing with [`AppError::Unavailable`] once `limit` elapses.
///
/// Implementations have no built-in deadline; pool acquire timeouts do not
/// bound a query that stalls after it has a connection.
pub async fn with_store_timeout<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(AppError::unavailable(
            "Store operation timed out",
            json!({ "timeout_ms": limit.as_millis() as u64 }),
        )),
    }
}

#[cfg(test)]
pub use click_repository::MockClickRepository;
#[cfg(test)]
pub use url_repository::MockUrlRepository;
