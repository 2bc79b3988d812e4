#![allow(dead_code)]

use axum_test::TestServer;
use linkpulse::application::click_publisher::{ClickPublisher, PublisherTask};
use linkpulse::application::services::{LinkService, StatsService};
use linkpulse::domain::entities::NewUrlRecord;
use linkpulse::domain::id_allocator::IdAllocator;
use linkpulse::domain::repositories::UrlRepository;
use linkpulse::infrastructure::persistence::MemoryStore;
use linkpulse::infrastructure::queue::MemoryChannel;
use linkpulse::routes::app_routes;
use linkpulse::state::AppState;
use linkpulse::utils::base62;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "http://short.test";

/// Store deadline for the API services; short so stalled-store tests finish quickly.
pub const STORE_TIMEOUT: Duration = Duration::from_millis(200);

/// API state wired to in-memory backends, with handles to inspect them.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub channel: Arc<MemoryChannel>,
    pub allocator: Arc<IdAllocator>,
    pub publisher_task: PublisherTask,
}

impl TestApp {
    pub fn server(&self) -> TestServer {
        TestServer::new(app_routes(self.state.clone())).unwrap()
    }

    /// Stops the publisher and waits until every submitted click is in the channel.
    pub async fn flush_clicks(self) -> (Arc<MemoryStore>, Arc<MemoryChannel>) {
        assert!(self.publisher_task.drain(Duration::from_secs(5)).await);
        (self.store, self.channel)
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with_seed(0)
}

pub fn create_test_app_with_seed(seed: u64) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let channel = Arc::new(MemoryChannel::new(Duration::from_secs(30)));
    let allocator = Arc::new(IdAllocator::new(seed));

    let (click_publisher, publisher_task) = ClickPublisher::spawn(channel.clone(), 4);

    let state = AppState::new(
        Arc::new(
            LinkService::new(store.clone(), allocator.clone(), BASE_URL)
                .with_store_timeout(STORE_TIMEOUT),
        ),
        Arc::new(StatsService::new(store.clone()).with_store_timeout(STORE_TIMEOUT)),
        click_publisher,
        channel.clone(),
    );

    TestApp {
        state,
        store,
        channel,
        allocator,
        publisher_task,
    }
}

/// Inserts a URL record directly, bypassing the allocator.
pub async fn create_test_url(store: &MemoryStore, id: u64, long_url: &str) -> String {
    let short_code = base62::encode(id);
    store
        .save(NewUrlRecord {
            id,
            short_code: short_code.clone(),
            long_url: long_url.to_string(),
        })
        .await
        .unwrap();
    short_code
}
