//! Best-effort, non-blocking click publishing for the redirect path.
//!
//! Handlers hand click events to [`ClickPublisher::submit`], which never waits
//! and never fails the request. A single background task drains the queue and
//! publishes to the [`EventChannel`] with bounded concurrency. Publish failures
//! are logged and counted, and the click is lost.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::event_channel::EventChannel;

/// Cloneable submit handle shared by request handlers.
#[derive(Clone)]
pub struct ClickPublisher {
    sender: mpsc::UnboundedSender<ClickEvent>,
}

/// Owner of the background publishing task.
pub struct PublisherTask {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl ClickPublisher {
    /// Starts the publishing task.
    ///
    /// `concurrency` bounds how many publishes may be in flight at once and is
    /// clamped to at least 1.
    pub fn spawn(channel: Arc<dyn EventChannel>, concurrency: usize) -> (Self, PublisherTask) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let permits = u32::try_from(concurrency.max(1)).unwrap_or(u32::MAX);

        let handle = tokio::spawn(publish_loop(receiver, channel, permits, shutdown.clone()));

        (Self { sender }, PublisherTask { handle, shutdown })
    }

    /// Queues a click for publishing without waiting.
    ///
    /// Returns `false` if the publisher has shut down and the click was dropped.
    pub fn submit(&self, event: ClickEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => {
                counter!("clicks_submitted_total").increment(1);
                true
            }
            Err(mpsc::error::SendError(event)) => {
                counter!("clicks_dropped_total").increment(1);
                warn!(
                    short_code = %event.short_code,
                    "Click publisher is closed, dropping click"
                );
                false
            }
        }
    }

    /// Whether the background task still accepts clicks.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl PublisherTask {
    /// Stops accepting clicks and waits for queued and in-flight publishes.
    ///
    /// Returns `false` if the grace period elapsed first; anything still
    /// unpublished is lost.
    pub async fn drain(self, grace_period: Duration) -> bool {
        self.shutdown.cancel();

        match tokio::time::timeout(grace_period, self.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Click publisher task failed");
                false
            }
            Err(_) => {
                warn!(
                    grace_period_secs = grace_period.as_secs(),
                    "Click publisher did not drain in time, pending clicks dropped"
                );
                false
            }
        }
    }
}

async fn publish_loop(
    mut receiver: mpsc::UnboundedReceiver<ClickEvent>,
    channel: Arc<dyn EventChannel>,
    permits: u32,
    shutdown: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(permits as usize));
    let mut closing = false;

    loop {
        let next = if closing {
            receiver.recv().await
        } else {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    receiver.close();
                    closing = true;
                    continue;
                }
                event = receiver.recv() => event,
            }
        };

        let Some(event) = next else {
            break;
        };

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        let channel = channel.clone();
        tokio::spawn(async move {
            publish_one(channel.as_ref(), &event).await;
            drop(permit);
        });
    }

    // Every permit back means every spawned publish has finished.
    let _ = semaphore.acquire_many(permits).await;
    info!("Click publisher stopped");
}

async fn publish_one(channel: &dyn EventChannel, event: &ClickEvent) {
    match channel.publish(event.body()).await {
        Ok(()) => {
            counter!("clicks_published_total").increment(1);
            debug!(short_code = %event.short_code, "Published click event");
        }
        Err(e) => {
            counter!("clicks_publish_failed_total").increment(1);
            warn!(
                short_code = %event.short_code,
                error = %e,
                "Failed to publish click event"
            );
        }
    }
}
