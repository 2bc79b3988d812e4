//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `POST /`               - Shorten a URL
//! - `GET  /{code}`         - Short link redirect
//! - `POST /api/analytics`  - Click totals per link
//! - `GET  /health`         - Health check: database, click queue, click publisher
//! - `OPTIONS *`            - CORS preflight
//!
//! # Middleware
//!
//! - **CORS** - Permissive headers on every response
//! - **Tracing** - Structured request/response logging
//! - **Path normalization** - Trailing slash handling

use crate::api::handlers::{analytics_handler, health_handler, redirect_handler, shorten_handler};
use crate::api::middleware::{cors, tracing};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Routes with CORS and tracing applied, without path normalization.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/", post(shorten_handler))
        .route("/health", get(health_handler))
        .route("/api/analytics", post(analytics_handler))
        .route("/{code}", get(redirect_handler))
        .with_state(state)
        .layer(middleware::from_fn(cors::layer))
        .layer(tracing::layer())
}

/// Constructs the application service with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(app_routes(state))
}
