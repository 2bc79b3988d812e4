//! Repository trait for click records and analytics.

use crate::domain::entities::{Click, UrlAnalytics};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for click tracking.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgClickRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryStore`] - In-process implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClickRepository: Send + Sync {
    /// Appends a click for `url_id`. The timestamp is assigned by the store.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if `url_id` references no URL record.
    /// Returns [`AppError::Unavailable`] on transient store failures; the
    /// caller must leave the originating message un-acknowledged.
    async fn record_click(&self, url_id: u64) -> Result<Click, AppError>;

    /// Aggregates click counts over every URL record, including those with
    /// zero clicks, ordered by `click_count` descending.
    ///
    /// Ties are returned in store-defined order.
    async fn aggregate_clicks(&self) -> Result<Vec<UrlAnalytics>, AppError>;

    /// Counts clicks recorded for one URL record.
    async fn count_clicks(&self, url_id: u64) -> Result<i64, AppError>;
}
