//! API server initialization and runtime setup.
//!
//! Handles store and queue connections, allocator seeding, the click
//! publisher, and the Axum server lifecycle.

use crate::application::click_publisher::ClickPublisher;
use crate::application::services::{LinkService, StatsService};
use crate::config::Config;
use crate::domain::event_channel::EventChannel;
use crate::domain::id_allocator::IdAllocator;
use crate::domain::repositories::UrlRepository;
use crate::infrastructure::persistence::{
    PgClickRepository, PgUrlRepository, connect_pool_with_retry,
};
use crate::infrastructure::queue::RedisStreamChannel;
use crate::routes::app_router;
use crate::shutdown::cancel_on_signal;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;

/// Runs the API server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool (with startup retry)
/// - Apply migrations
/// - Identifier allocator seeded from the largest stored id
/// - Redis click stream (with startup retry)
/// - Background click publisher
/// - Axum HTTP server
///
/// On SIGINT/SIGTERM the server stops accepting connections, finishes
/// in-flight requests, drains the publisher and closes the pool.
///
/// # Errors
///
/// Returns an error if:
/// - Database or Redis stay unreachable for the whole retry budget
/// - Migrations fail
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_pool_with_retry(&config)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations applied");

    let pool = Arc::new(pool);
    let url_repository: Arc<dyn UrlRepository> = Arc::new(PgUrlRepository::new(pool.clone()));
    let click_repository = Arc::new(PgClickRepository::new(pool.clone()));

    let seed = url_repository
        .max_id()
        .await
        .context("Failed to read the largest URL id")?;
    let allocator = Arc::new(IdAllocator::new(seed));
    tracing::info!(seed, "Identifier allocator seeded");

    let channel: Arc<dyn EventChannel> = Arc::new(
        RedisStreamChannel::connect_with_retry(
            &config.redis_url,
            config.stream_settings(),
            config.startup_retry(),
        )
        .await
        .context("Failed to connect to Redis")?,
    );

    let (click_publisher, publisher_task) =
        ClickPublisher::spawn(channel.clone(), config.click_publish_concurrency);
    tracing::info!(
        concurrency = config.click_publish_concurrency,
        "Click publisher started"
    );

    let state = AppState::new(
        Arc::new(
            LinkService::new(
                url_repository,
                allocator.clone(),
                config.api_base_url.clone(),
            )
            .with_store_timeout(config.store_timeout()),
        ),
        Arc::new(StatsService::new(click_repository).with_store_timeout(config.store_timeout())),
        click_publisher,
        channel,
    );

    let app = app_router(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    let shutdown = cancel_on_signal();

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await?;

    tracing::info!("HTTP server stopped, draining click publisher");
    if publisher_task.drain(config.shutdown_grace()).await {
        tracing::info!("Click publisher drained");
    }

    pool.close().await;
    tracing::info!(
        last_id = allocator.last_issued(),
        "API server shut down"
    );

    Ok(())
}
