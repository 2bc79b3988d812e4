//! Background consumer that turns queued click events into click records.
//!
//! The consumer long-polls the [`EventChannel`], resolves each message body to a
//! URL id, appends a click and only then deletes the message. Anything that goes
//! wrong leaves the message in the channel, which redelivers it after its
//! visibility timeout. A redelivered message that was already recorded adds one
//! more click: counts mean "at least this many visits".

use metrics::counter;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::event_channel::{EventChannel, ReceivedMessage};
use crate::domain::repositories::{self, ClickRepository, UrlRepository};
use crate::error::AppError;

/// Tuning knobs for [`ClickConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Maximum messages requested per receive (1..=10).
    pub batch_size: usize,
    /// Long-poll window for one receive.
    pub wait: Duration,
    /// Upper bound on each store call.
    pub store_timeout: Duration,
    /// Deliveries after which an unresolvable message is dead-lettered.
    /// `0` keeps such messages in the queue forever.
    pub max_receives: u32,
    /// Cap on the delay between failed receives.
    pub backoff_max: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            wait: Duration::from_secs(20),
            store_timeout: repositories::DEFAULT_STORE_TIMEOUT,
            max_receives: 5,
            backoff_max: Duration::from_secs(30),
        }
    }
}

/// What happened to a single received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Click persisted and message deleted.
    Recorded,
    /// Click persisted but the delete failed; the message will come back.
    RecordedUnacked,
    /// Nothing persisted; the message is left for redelivery.
    Retained,
    /// The message can never resolve and was moved to the dead-letter queue.
    DeadLettered,
}

impl ClickOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::RecordedUnacked => "recorded_unacked",
            Self::Retained => "retained",
            Self::DeadLettered => "dead_lettered",
        }
    }
}

/// The click-recording loop.
pub struct ClickConsumer {
    channel: Arc<dyn EventChannel>,
    urls: Arc<dyn UrlRepository>,
    clicks: Arc<dyn ClickRepository>,
    settings: ConsumerSettings,
}

impl ClickConsumer {
    pub fn new(
        channel: Arc<dyn EventChannel>,
        urls: Arc<dyn UrlRepository>,
        clicks: Arc<dyn ClickRepository>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            channel,
            urls,
            clicks,
            settings,
        }
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Cancellation is observed before every receive, while waiting on a
    /// receive or a backoff sleep, and before each message. A message that is
    /// already being processed is always finished.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            batch_size = self.settings.batch_size,
            wait_secs = self.settings.wait.as_secs(),
            max_receives = self.settings.max_receives,
            "Click consumer started"
        );

        let mut backoff = self.receive_backoff();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self
                    .channel
                    .receive(self.settings.batch_size, self.settings.wait) => result,
            };

            match received {
                Ok(messages) => {
                    backoff = self.receive_backoff();

                    if messages.is_empty() {
                        continue;
                    }

                    debug!(count = messages.len(), "Received click messages");
                    self.process_batch(messages, &shutdown).await;
                }
                Err(e) => {
                    counter!("click_receive_errors_total").increment(1);
                    let delay = backoff.next().unwrap_or(self.settings.backoff_max);
                    warn!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Failed to receive click messages, backing off"
                    );

                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("Click consumer stopped");
    }

    /// Processes a received batch in order, each message independently.
    ///
    /// Stops early when `shutdown` is cancelled; unprocessed messages stay in
    /// the channel and are redelivered.
    pub async fn process_batch(
        &self,
        messages: Vec<ReceivedMessage>,
        shutdown: &CancellationToken,
    ) -> Vec<ClickOutcome> {
        let total = messages.len();
        let mut outcomes = Vec::with_capacity(total);

        for (processed, message) in messages.into_iter().enumerate() {
            if shutdown.is_cancelled() {
                info!(
                    remaining = total - processed,
                    "Shutdown requested, leaving remaining messages for redelivery"
                );
                break;
            }

            let outcome = self.process_message(&message).await;
            counter!("click_messages_total", "outcome" => outcome.as_str()).increment(1);
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Resolves, records and acknowledges one message.
    pub async fn process_message(&self, message: &ReceivedMessage) -> ClickOutcome {
        let Some(event) = ClickEvent::from_body(&message.body) else {
            return self.handle_unresolvable(message, "empty message body").await;
        };

        let url_id = match self
            .with_store_timeout(self.urls.resolve_id(&event.short_code))
            .await
        {
            Ok(id) => id,
            Err(e) if e.is_not_found() => {
                return self.handle_unresolvable(message, "unknown short code").await;
            }
            Err(e) => {
                warn!(
                    short_code = %event.short_code,
                    receive_count = message.receive_count,
                    error = %e,
                    "Failed to resolve short code, leaving message for redelivery"
                );
                return ClickOutcome::Retained;
            }
        };

        if let Err(e) = self
            .with_store_timeout(self.clicks.record_click(url_id))
            .await
        {
            warn!(
                short_code = %event.short_code,
                url_id,
                error = %e,
                "Failed to save click, leaving message for redelivery"
            );
            return ClickOutcome::Retained;
        }

        debug!(short_code = %event.short_code, url_id, "Saved click");

        match self.channel.delete(&message.receipt_handle).await {
            Ok(()) => ClickOutcome::Recorded,
            Err(e) => {
                warn!(
                    short_code = %event.short_code,
                    receipt_handle = %message.receipt_handle,
                    error = %e,
                    "Failed to delete processed message, it may be recorded again"
                );
                ClickOutcome::RecordedUnacked
            }
        }
    }

    async fn handle_unresolvable(&self, message: &ReceivedMessage, reason: &str) -> ClickOutcome {
        let max_receives = self.settings.max_receives;

        if max_receives == 0 || message.receive_count < max_receives {
            warn!(
                body = %message.body,
                receive_count = message.receive_count,
                reason,
                "Cannot resolve click message, leaving it for redelivery"
            );
            return ClickOutcome::Retained;
        }

        match self.channel.dead_letter(message, reason).await {
            Ok(()) => {
                warn!(
                    body = %message.body,
                    receive_count = message.receive_count,
                    reason,
                    "Moved unresolvable click message to dead-letter queue"
                );
                ClickOutcome::DeadLettered
            }
            Err(e) => {
                warn!(
                    body = %message.body,
                    error = %e,
                    "Failed to dead-letter click message"
                );
                ClickOutcome::Retained
            }
        }
    }

    async fn with_store_timeout<T>(
        &self,
        operation: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        repositories::with_store_timeout(self.settings.store_timeout, operation).await
    }

    /// Capped exponential backoff (500ms, 1s, 2s, ...) with half of each delay jittered.
    fn receive_backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        ExponentialBackoff::from_millis(2)
            .factor(250)
            .max_delay(self.settings.backoff_max)
            .map(|delay| delay / 2 + jitter(delay / 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Click;
    use crate::domain::event_channel::MockEventChannel;
    use crate::domain::repositories::{MockClickRepository, MockUrlRepository};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> ConsumerSettings {
        ConsumerSettings {
            batch_size: 10,
            wait: Duration::from_millis(10),
            store_timeout: Duration::from_secs(1),
            max_receives: 3,
            backoff_max: Duration::from_millis(10),
        }
    }

    fn message(body: &str, handle: &str, receive_count: u32) -> ReceivedMessage {
        ReceivedMessage::new(body, handle, receive_count)
    }

    fn consumer(
        channel: MockEventChannel,
        urls: MockUrlRepository,
        clicks: MockClickRepository,
        settings: ConsumerSettings,
    ) -> ClickConsumer {
        ClickConsumer::new(
            Arc::new(channel),
            Arc::new(urls),
            Arc::new(clicks),
            settings,
        )
    }

    fn not_found() -> AppError {
        AppError::not_found("Short link not found", json!({}))
    }

    #[tokio::test]
    async fn test_records_and_deletes_message() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let mut clicks = MockClickRepository::new();

        urls.expect_resolve_id()
            .withf(|code| code == "g8")
            .times(1)
            .returning(|_| Ok(1000));
        clicks
            .expect_record_click()
            .withf(|url_id| *url_id == 1000)
            .times(1)
            .returning(|url_id| Ok(Click::new(1, url_id, Utc::now())));
        channel
            .expect_delete()
            .withf(|handle| handle == "h-1")
            .times(1)
            .returning(|_| Ok(()));

        let consumer = consumer(channel, urls, clicks, settings());
        let outcome = consumer.process_message(&message("g8", "h-1", 1)).await;

        assert_eq!(outcome, ClickOutcome::Recorded);
    }

    #[tokio::test]
    async fn test_unknown_code_is_retained_without_click() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let mut clicks = MockClickRepository::new();

        urls.expect_resolve_id()
            .times(1)
            .returning(|_| Err(not_found()));
        clicks.expect_record_click().times(0);
        channel.expect_delete().times(0);
        channel.expect_dead_letter().times(0);

        let consumer = consumer(channel, urls, clicks, settings());
        let outcome = consumer.process_message(&message("nope", "h-1", 1)).await;

        assert_eq!(outcome, ClickOutcome::Retained);
    }

    #[tokio::test]
    async fn test_unknown_code_dead_lettered_after_max_receives() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let mut clicks = MockClickRepository::new();

        urls.expect_resolve_id()
            .times(1)
            .returning(|_| Err(not_found()));
        clicks.expect_record_click().times(0);
        channel.expect_delete().times(0);
        channel
            .expect_dead_letter()
            .withf(|msg, reason| msg.receipt_handle == "h-9" && reason == "unknown short code")
            .times(1)
            .returning(|_, _| Ok(()));

        let consumer = consumer(channel, urls, clicks, settings());
        let outcome = consumer.process_message(&message("nope", "h-9", 3)).await;

        assert_eq!(outcome, ClickOutcome::DeadLettered);
    }

    #[tokio::test]
    async fn test_zero_max_receives_retries_forever() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let clicks = MockClickRepository::new();

        urls.expect_resolve_id().returning(|_| Err(not_found()));
        channel.expect_dead_letter().times(0);

        let consumer = consumer(
            channel,
            urls,
            clicks,
            ConsumerSettings {
                max_receives: 0,
                ..settings()
            },
        );
        let outcome = consumer.process_message(&message("nope", "h-1", 500)).await;

        assert_eq!(outcome, ClickOutcome::Retained);
    }

    #[tokio::test]
    async fn test_empty_body_never_reaches_store() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let clicks = MockClickRepository::new();

        urls.expect_resolve_id().times(0);
        channel
            .expect_dead_letter()
            .withf(|_, reason| reason == "empty message body")
            .times(1)
            .returning(|_, _| Ok(()));

        let consumer = consumer(channel, urls, clicks, settings());
        let outcome = consumer.process_message(&message("  ", "h-1", 3)).await;

        assert_eq!(outcome, ClickOutcome::DeadLettered);
    }

    #[tokio::test]
    async fn test_failed_dead_letter_retains_message() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let clicks = MockClickRepository::new();

        urls.expect_resolve_id().returning(|_| Err(not_found()));
        channel
            .expect_dead_letter()
            .times(1)
            .returning(|_, _| Err(AppError::unavailable("down", json!({}))));

        let consumer = consumer(channel, urls, clicks, settings());
        let outcome = consumer.process_message(&message("nope", "h-1", 7)).await;

        assert_eq!(outcome, ClickOutcome::Retained);
    }

    #[tokio::test]
    async fn test_store_failure_on_resolve_is_retained() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let mut clicks = MockClickRepository::new();

        urls.expect_resolve_id()
            .returning(|_| Err(AppError::unavailable("Database unavailable", json!({}))));
        clicks.expect_record_click().times(0);
        channel.expect_delete().times(0);
        channel.expect_dead_letter().times(0);

        let consumer = consumer(channel, urls, clicks, settings());
        let outcome = consumer.process_message(&message("g8", "h-1", 10)).await;

        assert_eq!(outcome, ClickOutcome::Retained);
    }

    #[tokio::test]
    async fn test_record_failure_leaves_message_undeleted() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let mut clicks = MockClickRepository::new();

        urls.expect_resolve_id().returning(|_| Ok(5));
        clicks
            .expect_record_click()
            .times(1)
            .returning(|_| Err(AppError::unavailable("Database unavailable", json!({}))));
        channel.expect_delete().times(0);

        let consumer = consumer(channel, urls, clicks, settings());
        let outcome = consumer.process_message(&message("5", "h-1", 1)).await;

        assert_eq!(outcome, ClickOutcome::Retained);
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported_as_unacked() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let mut clicks = MockClickRepository::new();

        urls.expect_resolve_id().returning(|_| Ok(5));
        clicks
            .expect_record_click()
            .times(1)
            .returning(|url_id| Ok(Click::new(1, url_id, Utc::now())));
        channel
            .expect_delete()
            .times(1)
            .returning(|_| Err(AppError::unavailable("down", json!({}))));

        let consumer = consumer(channel, urls, clicks, settings());
        let outcome = consumer.process_message(&message("5", "h-1", 1)).await;

        assert_eq!(outcome, ClickOutcome::RecordedUnacked);
    }

    #[tokio::test]
    async fn test_batch_failures_are_isolated() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let mut clicks = MockClickRepository::new();

        urls.expect_resolve_id().returning(|code| match code {
            "a" => Ok(10),
            "c" => Ok(12),
            _ => Err(not_found()),
        });
        clicks
            .expect_record_click()
            .times(2)
            .returning(|url_id| Ok(Click::new(1, url_id, Utc::now())));
        channel.expect_delete().times(2).returning(|_| Ok(()));

        let consumer = consumer(channel, urls, clicks, settings());
        let outcomes = consumer
            .process_batch(
                vec![
                    message("a", "h-a", 1),
                    message("b", "h-b", 1),
                    message("c", "h-c", 1),
                ],
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(
            outcomes,
            vec![
                ClickOutcome::Recorded,
                ClickOutcome::Retained,
                ClickOutcome::Recorded
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_batch_is_left_untouched() {
        let channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let clicks = MockClickRepository::new();

        urls.expect_resolve_id().times(0);

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let consumer = consumer(channel, urls, clicks, settings());
        let outcomes = consumer
            .process_batch(vec![message("a", "h-a", 1)], &shutdown)
            .await;

        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let consumer = consumer(
            MockEventChannel::new(),
            MockUrlRepository::new(),
            MockClickRepository::new(),
            ConsumerSettings {
                store_timeout: Duration::from_millis(20),
                ..settings()
            },
        );

        let result = consumer
            .with_store_timeout(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, AppError>(1u64)
            })
            .await;

        assert!(result.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_run_processes_messages_until_cancelled() {
        let mut channel = MockEventChannel::new();
        let mut urls = MockUrlRepository::new();
        let mut clicks = MockClickRepository::new();

        let shutdown = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let token = shutdown.clone();
        let counter = calls.clone();
        channel.expect_receive().returning(move |max, _| {
            assert_eq!(max, 10);
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![ReceivedMessage::new("g8", "h-1", 1)])
            } else {
                token.cancel();
                Ok(vec![])
            }
        });
        channel.expect_delete().times(1).returning(|_| Ok(()));
        urls.expect_resolve_id().times(1).returning(|_| Ok(1000));
        clicks
            .expect_record_click()
            .times(1)
            .returning(|url_id| Ok(Click::new(1, url_id, Utc::now())));

        let consumer = consumer(channel, urls, clicks, settings());
        tokio::time::timeout(Duration::from_secs(5), consumer.run(shutdown))
            .await
            .expect("consumer should stop after cancellation");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_survives_receive_errors() {
        let mut channel = MockEventChannel::new();

        let shutdown = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let token = shutdown.clone();
        let counter = calls.clone();
        channel.expect_receive().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) >= 3 {
                token.cancel();
            }
            Err(AppError::unavailable("Event channel unavailable", json!({})))
        });

        let consumer = consumer(
            channel,
            MockUrlRepository::new(),
            MockClickRepository::new(),
            settings(),
        );
        tokio::time::timeout(Duration::from_secs(5), consumer.run(shutdown))
            .await
            .expect("consumer should stop after cancellation");

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_already_cancelled() {
        let mut channel = MockEventChannel::new();
        channel.expect_receive().times(0);

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let consumer = consumer(
            channel,
            MockUrlRepository::new(),
            MockClickRepository::new(),
            settings(),
        );
        consumer.run(shutdown).await;
    }

    #[test]
    fn test_backoff_is_capped_and_positive() {
        let consumer = consumer(
            MockEventChannel::new(),
            MockUrlRepository::new(),
            MockClickRepository::new(),
            ConsumerSettings {
                backoff_max: Duration::from_secs(4),
                ..settings()
            },
        );

        let delays: Vec<Duration> = consumer.receive_backoff().take(10).collect();

        assert!(delays[0] >= Duration::from_millis(250));
        assert!(delays[0] <= Duration::from_millis(500));
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(4)));
        assert!(delays[9] >= Duration::from_secs(2));
    }
}
