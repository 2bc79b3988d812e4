//! Click worker process: consumes click events and serves a liveness endpoint.

use crate::api::middleware::tracing as http_tracing;
use crate::config::Config;
use crate::domain::click_worker::ClickConsumer;
use crate::infrastructure::persistence::{
    PgClickRepository, PgUrlRepository, connect_pool_with_retry,
};
use crate::infrastructure::queue::RedisStreamChannel;
use crate::shutdown::cancel_on_signal;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

/// Body of the worker liveness response.
pub const ALIVE_MESSAGE: &str = "Worker is alive and running.";

/// Liveness router: `GET /` answers `200` with a plain-text message.
pub fn health_router() -> Router {
    Router::new()
        .route("/", get(alive_handler))
        .layer(http_tracing::layer())
}

async fn alive_handler() -> &'static str {
    ALIVE_MESSAGE
}

/// Runs the click worker with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool (with startup retry)
/// - Apply migrations
/// - Redis click stream and consumer group (with startup retry)
/// - Liveness HTTP server on `WORKER_LISTEN`
/// - The click consumer loop
///
/// On SIGINT/SIGTERM the consumer finishes the message in hand, the liveness
/// server stops and the pool is closed.
///
/// # Errors
///
/// Returns an error if a dependency stays unreachable for the whole retry
/// budget, migrations fail, or the liveness server cannot bind.
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_pool_with_retry(&config)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let pool = Arc::new(pool);

    let channel = RedisStreamChannel::connect_with_retry(
        &config.redis_url,
        config.stream_settings(),
        config.startup_retry(),
    )
    .await
    .context("Failed to connect to Redis")?;

    let consumer = ClickConsumer::new(
        Arc::new(channel),
        Arc::new(PgUrlRepository::new(pool.clone())),
        Arc::new(PgClickRepository::new(pool.clone())),
        config.consumer_settings(),
    );

    let addr: SocketAddr = config
        .worker_listen_addr
        .parse()
        .with_context(|| format!("Invalid worker listen address '{}'", config.worker_listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Worker health endpoint listening on http://{addr}");

    let shutdown = cancel_on_signal();

    let health_server = tokio::spawn(
        axum::serve(listener, health_router())
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future(),
    );

    consumer.run(shutdown.clone()).await;

    shutdown.cancel();
    match health_server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Worker health server failed"),
        Err(e) => tracing::warn!(error = %e, "Worker health server task panicked"),
    }

    pool.close().await;
    tracing::info!("Click worker shut down");

    Ok(())
}
