//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::domain::click_event::ClickEvent;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Request Flow
///
/// 1. Look up the long URL for the code
/// 2. Submit a click event to the publisher (non-blocking)
/// 3. Return 302 Found
///
/// # Click Tracking
///
/// Click events are published to the event channel in the background and
/// recorded later by the click worker. A failed publish loses the click but
/// never affects the redirect.
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let long_url = state.link_service.resolve(&code).await?;

    state.click_publisher.submit(ClickEvent::new(code));

    Ok((StatusCode::FOUND, [(header::LOCATION, long_url)]))
}
