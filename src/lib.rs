//! # LinkPulse
//!
//! A URL shortener with asynchronous click analytics, built with Axum,
//! PostgreSQL and Redis Streams.
//!
//! ## Architecture
//!
//! This crate follows Clean Architecture principles with clear layer separation:
//!
//! - **Domain Layer** ([`domain`]) - Entities, store and queue contracts, the click consumer
//! - **Application Layer** ([`application`]) - Link and analytics services, click publisher
//! - **Infrastructure Layer** ([`infrastructure`]) - PostgreSQL, Redis Streams, in-memory backends
//! - **API Layer** ([`api`]) - REST handlers, DTOs, and middleware
//!
//! ## Click Pipeline
//!
//! Redirects never wait for analytics. The API server answers `302` as soon as
//! the short code resolves and hands a click event to the
//! [`application::click_publisher::ClickPublisher`], which publishes it to a
//! Redis stream in the background. The worker binary runs the
//! [`domain::click_worker::ClickConsumer`], which records each click and only
//! then acknowledges the message. Delivery is at-least-once, so click counts
//! may over-count but never silently lose a delivered event.
//!
//! ## Binaries
//!
//! - `linkpulse` - API server ([`server::run`])
//! - `linkpulse-worker` - Click worker ([`worker::run`])
//! - `linkpulse-admin` - Analytics and connectivity checks
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;
pub mod shutdown;
pub mod telemetry;
pub mod worker;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::click_publisher::ClickPublisher;
    pub use crate::application::services::{LinkService, StatsService};
    pub use crate::domain::click_event::ClickEvent;
    pub use crate::domain::entities::{Click, UrlAnalytics, UrlRecord};
    pub use crate::domain::event_channel::EventChannel;
    pub use crate::domain::id_allocator::IdAllocator;
    pub use crate::error::AppError;
    pub use crate::state::AppState;
}
