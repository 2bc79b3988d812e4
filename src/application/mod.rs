//! Application layer services implementing business logic.
//!
//! This layer orchestrates domain operations by coordinating repository calls,
//! validation, and business rules. Services consume repository traits and provide
//! a clean API for HTTP handlers.
//!
//! # Available Services
//!
//! - [`services::link_service::LinkService`] - Short link creation and resolution
//! - [`services::stats_service::StatsService`] - Click analytics
//! - [`click_publisher::ClickPublisher`] - Non-blocking click submission to the event channel

pub mod click_publisher;
pub mod services;
