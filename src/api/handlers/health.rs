//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Database**: Round trip to the URL store
/// 2. **Click Queue**: Event channel reachability
/// 3. **Click Publisher**: Background publishing task still accepting clicks
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Connected" },
///     "click_queue": { "status": "ok", "message": "Connected" },
///     "click_publisher": { "status": "ok", "message": "Running" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let (store_ok, queue_ok) = tokio::join!(
        state.link_service.store_healthy(),
        state.click_channel.health_check()
    );

    let database = if store_ok {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Database connection failed")
    };

    let click_queue = if queue_ok {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Click queue connection failed")
    };

    let click_publisher = if state.click_publisher.is_running() {
        CheckStatus::ok("Running")
    } else {
        CheckStatus::error("Click publisher is stopped")
    };

    let all_healthy = database.is_ok() && click_queue.is_ok() && click_publisher.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            click_queue,
            click_publisher,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
