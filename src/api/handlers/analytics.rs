//! Handler for the click analytics report.

use axum::{Json, extract::State, http::header, response::IntoResponse};

use crate::api::dto::analytics::AnalyticsItem;
use crate::error::AppError;
use crate::state::AppState;

/// Returns click totals for every short link, most clicked first.
///
/// # Endpoint
///
/// `POST /api/analytics`
///
/// # Response
///
/// ```json
/// [
///   { "short_code": "g8", "long_url": "https://example.com", "click_count": 12 },
///   { "short_code": "g9", "long_url": "https://example.org", "click_count": 0 }
/// ]
/// ```
///
/// Counts are eventually consistent with redirects. The response is never cached.
pub async fn analytics_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.stats_service.analytics().await?;
    let items: Vec<AnalyticsItem> = rows.into_iter().map(AnalyticsItem::from).collect();

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Json(items),
    ))
}
