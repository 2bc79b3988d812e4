//! Permissive CORS for browser clients.

use axum::{
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Adds CORS headers to every response and answers preflight requests.
///
/// `OPTIONS` requests to any path get `200 OK` with an empty body and never
/// reach a handler.
///
/// # Headers
///
/// - `Access-Control-Allow-Origin: *`
/// - `Access-Control-Allow-Methods: POST, GET, OPTIONS`
/// - `Access-Control-Allow-Headers: Content-Type`
pub async fn layer(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );

    response
}
