//! Request processing middleware.
//!
//! - [`cors`] - CORS headers and preflight handling
//! - [`tracing`] - Request/response tracing

pub mod cors;
pub mod tracing;
