//! Shared state injected into every HTTP handler.

use std::sync::Arc;

use crate::application::click_publisher::ClickPublisher;
use crate::application::services::{LinkService, StatsService};
use crate::domain::event_channel::EventChannel;

#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<LinkService>,
    pub stats_service: Arc<StatsService>,
    pub click_publisher: ClickPublisher,
    /// Probed by the health check; publishing goes through `click_publisher`.
    pub click_channel: Arc<dyn EventChannel>,
}

impl AppState {
    pub fn new(
        link_service: Arc<LinkService>,
        stats_service: Arc<StatsService>,
        click_publisher: ClickPublisher,
        click_channel: Arc<dyn EventChannel>,
    ) -> Self {
        Self {
            link_service,
            stats_service,
            click_publisher,
            click_channel,
        }
    }
}
