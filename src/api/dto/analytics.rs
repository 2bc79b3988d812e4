//! DTOs for the analytics endpoint.

use serde::Serialize;

use crate::domain::entities::UrlAnalytics;

/// One row of the analytics report.
#[derive(Debug, Serialize)]
pub struct AnalyticsItem {
    pub short_code: String,
    pub long_url: String,
    pub click_count: i64,
}

impl From<UrlAnalytics> for AnalyticsItem {
    fn from(row: UrlAnalytics) -> Self {
        Self {
            short_code: row.short_code,
            long_url: row.long_url,
            click_count: row.click_count,
        }
    }
}
