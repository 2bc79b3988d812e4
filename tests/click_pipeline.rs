mod common;

use linkpulse::application::services::LinkService;
use linkpulse::domain::click_worker::{ClickConsumer, ConsumerSettings};
use linkpulse::domain::entities::NewUrlRecord;
use linkpulse::domain::event_channel::EventChannel;
use linkpulse::domain::id_allocator::IdAllocator;
use linkpulse::domain::repositories::{ClickRepository, UrlRepository};
use linkpulse::infrastructure::persistence::MemoryStore;
use linkpulse::infrastructure::queue::MemoryChannel;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn fast_settings() -> ConsumerSettings {
    ConsumerSettings {
        batch_size: 10,
        wait: Duration::from_millis(100),
        store_timeout: Duration::from_secs(1),
        max_receives: 3,
        backoff_max: Duration::from_millis(50),
    }
}

fn spawn_consumer(
    store: Arc<MemoryStore>,
    channel: Arc<MemoryChannel>,
    settings: ConsumerSettings,
) -> (CancellationToken, JoinHandle<()>) {
    let consumer = ClickConsumer::new(channel, store.clone(), store, settings);
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();

    let handle = tokio::spawn(async move { consumer.run(token).await });

    (shutdown, handle)
}

async fn stop(shutdown: CancellationToken, handle: JoinHandle<()>) {
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("consumer did not stop")
        .unwrap();
}

const PATIENCE: Duration = Duration::from_secs(5);

/// Polls `check` until it returns true or the patience runs out.
async fn wait_until(check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + PATIENCE;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

async fn clicks(store: &MemoryStore, url_id: u64) -> i64 {
    store.count_clicks(url_id).await.unwrap_or(0)
}

/// Polls the click count until it satisfies `accept` or the patience runs out.
async fn wait_for_clicks(store: &MemoryStore, url_id: u64, accept: impl Fn(i64) -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + PATIENCE;
    while tokio::time::Instant::now() < deadline {
        if accept(clicks(store, url_id).await) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_redirect_then_click_is_recorded() {
    let app = common::create_test_app();
    let server = app.server();
    let (shutdown, handle) =
        spawn_consumer(app.store.clone(), app.channel.clone(), fast_settings());

    let body: Value = server
        .post("/")
        .json(&json!({ "url": "https://example.com/tracked" }))
        .await
        .json();
    assert_eq!(body["short_url"], "http://short.test/1");

    let response = server.get("/1").await;
    assert_eq!(response.status_code(), 302);

    assert!(wait_for_clicks(&app.store, 1, |n| n >= 1).await);
    assert!(wait_until(|| app.channel.is_empty()).await);

    let rows: Vec<Value> = server.post("/api/analytics").await.json();
    assert_eq!(rows[0]["short_code"], "1");
    assert!(rows[0]["click_count"].as_i64().unwrap() >= 1);

    stop(shutdown, handle).await;
}

#[tokio::test]
async fn test_unknown_code_records_nothing_and_is_dead_lettered() {
    let store = Arc::new(MemoryStore::new());
    common::create_test_url(&store, 1, "https://example.com").await;
    let channel = Arc::new(MemoryChannel::new(Duration::from_millis(30)));

    channel.publish("nope").await.unwrap();
    let (shutdown, handle) = spawn_consumer(store.clone(), channel.clone(), fast_settings());

    assert!(wait_until(|| channel.dead_letters().len() == 1).await);

    let letter = &channel.dead_letters()[0];
    assert_eq!(letter.body, "nope");
    assert_eq!(letter.reason, "unknown short code");
    assert_eq!(letter.receive_count, 3);

    assert!(channel.is_empty());
    assert_eq!(clicks(&store, 1).await, 0);

    stop(shutdown, handle).await;
}

#[tokio::test]
async fn test_bad_message_does_not_block_the_batch() {
    let store = Arc::new(MemoryStore::new());
    let code = common::create_test_url(&store, 42, "https://example.com").await;
    let channel = Arc::new(MemoryChannel::new(Duration::from_secs(30)));

    channel.publish(&code).await.unwrap();
    channel.publish("nope").await.unwrap();
    channel.publish("").await.unwrap();
    channel.publish(&code).await.unwrap();

    let (shutdown, handle) = spawn_consumer(store.clone(), channel.clone(), fast_settings());

    assert!(wait_for_clicks(&store, 42, |n| n == 2).await);

    // The two unresolvable messages stay in flight until their visibility timeout.
    assert!(wait_until(|| channel.len() == 2).await);
    assert!(channel.dead_letters().is_empty());

    stop(shutdown, handle).await;
}

#[tokio::test]
async fn test_store_outage_retains_message_until_recovery() {
    let store = Arc::new(MemoryStore::new());
    let code = common::create_test_url(&store, 5, "https://example.com").await;
    let channel = Arc::new(MemoryChannel::new(Duration::from_millis(50)));

    store.set_unavailable(true);
    channel.publish(&code).await.unwrap();

    let (shutdown, handle) = spawn_consumer(store.clone(), channel.clone(), fast_settings());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(channel.len(), 1);
    assert!(channel.dead_letters().is_empty());

    store.set_unavailable(false);

    assert!(wait_for_clicks(&store, 5, |n| n == 1).await);
    assert!(wait_until(|| channel.is_empty()).await);

    stop(shutdown, handle).await;
}

#[tokio::test]
async fn test_queue_outage_backs_off_and_recovers() {
    let store = Arc::new(MemoryStore::new());
    let code = common::create_test_url(&store, 9, "https://example.com").await;
    let channel = Arc::new(MemoryChannel::new(Duration::from_secs(30)));

    channel.publish(&code).await.unwrap();
    channel.set_unavailable(true);

    let (shutdown, handle) = spawn_consumer(store.clone(), channel.clone(), fast_settings());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(clicks(&store, 9).await, 0);

    channel.set_unavailable(false);

    assert!(wait_for_clicks(&store, 9, |n| n == 1).await);

    stop(shutdown, handle).await;
}

#[tokio::test]
async fn test_shutdown_interrupts_long_poll() {
    let store = Arc::new(MemoryStore::new());
    let channel = Arc::new(MemoryChannel::new(Duration::from_secs(30)));

    let settings = ConsumerSettings {
        wait: Duration::from_secs(20),
        ..fast_settings()
    };
    let (shutdown, handle) = spawn_consumer(store, channel, settings);

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop(shutdown, handle).await;
}

#[tokio::test]
async fn test_reseeding_continues_after_largest_id() {
    let store = Arc::new(MemoryStore::new());
    for id in [1, 2, 5] {
        store
            .save(NewUrlRecord {
                id,
                short_code: id.to_string(),
                long_url: format!("https://example.com/{id}"),
            })
            .await
            .unwrap();
    }

    let seed = store.max_id().await.unwrap();
    assert_eq!(seed, 5);

    let service = LinkService::new(
        store.clone(),
        Arc::new(IdAllocator::new(seed)),
        common::BASE_URL,
    );
    let record = service.shorten("https://example.com/new").await.unwrap();

    assert_eq!(record.id, 6);
    assert_eq!(record.short_code, "6");
    assert_eq!(
        store.load("6").await.unwrap(),
        "https://example.com/new"
    );
}
