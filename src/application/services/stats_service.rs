//! Click analytics queries.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::UrlAnalytics;
use crate::domain::repositories::{ClickRepository, DEFAULT_STORE_TIMEOUT, with_store_timeout};
use crate::error::AppError;

/// Read side of the click pipeline.
///
/// Counts reflect clicks the consumer has already persisted, so they may lag
/// behind redirects and may over-count clicks that were redelivered.
pub struct StatsService {
    clicks: Arc<dyn ClickRepository>,
    store_timeout: Duration,
}

impl StatsService {
    pub fn new(clicks: Arc<dyn ClickRepository>) -> Self {
        Self {
            clicks,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Overrides the upper bound on each store call.
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Click totals for every URL, most clicked first, including URLs that
    /// were never clicked.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unavailable`] if the store cannot be reached in time.
    pub async fn analytics(&self) -> Result<Vec<UrlAnalytics>, AppError> {
        with_store_timeout(self.store_timeout, self.clicks.aggregate_clicks()).await
    }

    /// Same as [`Self::analytics`], keeping at most `limit` rows.
    pub async fn top(&self, limit: usize) -> Result<Vec<UrlAnalytics>, AppError> {
        let mut rows = self.analytics().await?;
        rows.truncate(limit);
        Ok(rows)
    }
}
