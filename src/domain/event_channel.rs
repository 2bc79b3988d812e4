//! Event channel contract between the redirect path and the click consumer.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::AppError;

/// A message handed out by [`EventChannel::receive`].
///
/// The message stays owned by the channel until it is deleted with its
/// `receipt_handle`. If it is not deleted before the visibility timeout
/// elapses, the channel delivers it again with a higher `receive_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt_handle: String,
    /// Number of times this message has been delivered, starting at 1.
    pub receive_count: u32,
}

impl ReceivedMessage {
    pub fn new(
        body: impl Into<String>,
        receipt_handle: impl Into<String>,
        receive_count: u32,
    ) -> Self {
        Self {
            body: body.into(),
            receipt_handle: receipt_handle.into(),
            receive_count,
        }
    }
}

/// A durable, at-least-once message queue.
///
/// Delivery order is not guaranteed, and a message may be delivered more than
/// once: consumers must treat redelivery as normal.
///
/// # Implementations
///
/// - [`crate::infrastructure::queue::RedisStreamChannel`] - Redis Streams with a consumer group
/// - [`crate::infrastructure::queue::MemoryChannel`] - In-process queue with visibility timeouts
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Enqueues a message body.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unavailable`] if the queue cannot be reached.
    async fn publish(&self, body: &str) -> Result<(), AppError>;

    /// Long-polls for up to `max_messages` messages, waiting at most `wait`.
    ///
    /// An empty result is a normal outcome, not an error.
    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, AppError>;

    /// Removes a processed message. Deleting an unknown handle is not an error.
    async fn delete(&self, receipt_handle: &str) -> Result<(), AppError>;

    /// Moves a message that can never be processed to the dead-letter queue
    /// and removes it from the main queue.
    async fn dead_letter(&self, message: &ReceivedMessage, reason: &str) -> Result<(), AppError>;

    /// Reports whether the queue backend is reachable.
    async fn health_check(&self) -> bool;
}
