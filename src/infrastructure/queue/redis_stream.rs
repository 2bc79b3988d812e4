//! Redis Streams implementation of the event channel.
//!
//! Messages are stream entries with a single `body` field. A consumer group
//! tracks delivery: entries read with `XREADGROUP` stay in the group's pending
//! list until acknowledged, and entries left pending longer than the
//! visibility timeout are reclaimed with `XAUTOCLAIM` and delivered again.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamPendingCountReply,
    StreamPendingReply, StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::event_channel::{EventChannel, ReceivedMessage};
use crate::error::AppError;
use crate::infrastructure::startup::{StartupRetry, retry_startup};

const BODY_FIELD: &str = "body";

/// Stream, group and timing configuration for [`RedisStreamChannel`].
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub stream: String,
    pub group: String,
    /// Name of this process inside the consumer group.
    pub consumer: String,
    pub dead_letter_stream: String,
    /// Idle time after which an unacknowledged entry is delivered again.
    pub visibility_timeout: Duration,
    /// Pause between non-blocking reads while long-polling.
    pub poll_interval: Duration,
}

/// Snapshot of queue depth, used by the admin CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub length: usize,
    pub pending: usize,
    pub dead_letters: usize,
}

/// Event channel backed by a Redis stream and consumer group.
///
/// Receipt handles are stream entry ids. Deleting acknowledges the entry and
/// removes it from the stream in one `MULTI` block.
///
/// Long-polls are a sequence of non-blocking reads spaced by the poll
/// interval, so the shared multiplexed connection is never parked on a
/// server-side `BLOCK`.
pub struct RedisStreamChannel {
    conn: ConnectionManager,
    settings: StreamSettings,
}

impl RedisStreamChannel {
    /// Connects, verifies the connection with a PING and creates the consumer
    /// group (and stream) if missing.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unavailable`] if Redis cannot be reached.
    pub async fn connect(redis_url: &str, settings: StreamSettings) -> Result<Self, AppError> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut test_conn = manager.clone();
        test_conn.ping::<()>().await?;

        let channel = Self {
            conn: manager,
            settings,
        };
        channel.ensure_group().await?;

        info!(
            stream = %channel.settings.stream,
            group = %channel.settings.group,
            consumer = %channel.settings.consumer,
            "Click event stream ready"
        );

        Ok(channel)
    }

    /// Connects within the startup retry budget.
    ///
    /// # Errors
    ///
    /// Returns the last connection error once every attempt has failed.
    pub async fn connect_with_retry(
        redis_url: &str,
        settings: StreamSettings,
        retry: StartupRetry,
    ) -> Result<Self, AppError> {
        retry_startup("Redis", retry, || Self::connect(redis_url, settings.clone())).await
    }

    /// Creates the consumer group starting at the beginning of the stream, so
    /// events published before the first worker started are not skipped.
    async fn ensure_group(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let created: RedisResult<()> = conn
            .xgroup_create_mkstream(&self.settings.stream, &self.settings.group, "0")
            .await;

        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reports stream length, pending (delivered but unacknowledged) entries
    /// and dead-letter stream length.
    pub async fn stats(&self) -> Result<QueueStats, AppError> {
        let mut conn = self.conn.clone();

        let length: usize = conn.xlen(&self.settings.stream).await?;
        let pending: StreamPendingReply = conn
            .xpending(&self.settings.stream, &self.settings.group)
            .await?;
        let dead_letters: usize = conn.xlen(&self.settings.dead_letter_stream).await?;

        Ok(QueueStats {
            length,
            pending: pending.count(),
            dead_letters,
        })
    }

    fn to_message(entry: &StreamId, receive_count: u32) -> ReceivedMessage {
        // Entries without a body can never resolve and end up dead-lettered.
        let body: String = entry.get(BODY_FIELD).unwrap_or_default();
        ReceivedMessage::new(body, entry.id.clone(), receive_count)
    }

    /// Takes over entries whose visibility timeout has elapsed.
    async fn claim_expired(
        &self,
        conn: &mut ConnectionManager,
        count: usize,
    ) -> RedisResult<Vec<ReceivedMessage>> {
        let min_idle_ms = self.settings.visibility_timeout.as_millis() as u64;
        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(
                &self.settings.stream,
                &self.settings.group,
                &self.settings.consumer,
                min_idle_ms,
                "0-0",
                StreamAutoClaimOptions::default().count(count),
            )
            .await?;

        let mut messages = Vec::with_capacity(reply.claimed.len());
        for entry in &reply.claimed {
            let receive_count = self.delivery_count(conn, &entry.id).await?;
            messages.push(Self::to_message(entry, receive_count));
        }

        if !messages.is_empty() {
            debug!(count = messages.len(), "Reclaimed expired click messages");
        }

        Ok(messages)
    }

    async fn delivery_count(
        &self,
        conn: &mut ConnectionManager,
        entry_id: &str,
    ) -> RedisResult<u32> {
        let reply: StreamPendingCountReply = conn
            .xpending_count(
                &self.settings.stream,
                &self.settings.group,
                entry_id,
                entry_id,
                1,
            )
            .await?;

        Ok(reply
            .ids
            .first()
            .map(|pending| u32::try_from(pending.times_delivered).unwrap_or(u32::MAX))
            .unwrap_or(1))
    }

    /// Reads entries never delivered to any consumer of the group.
    async fn read_new(
        &self,
        conn: &mut ConnectionManager,
        count: usize,
    ) -> RedisResult<Vec<ReceivedMessage>> {
        let options = StreamReadOptions::default()
            .group(&self.settings.group, &self.settings.consumer)
            .count(count);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.settings.stream], &[">"], &options)
            .await?;

        Ok(reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids)
            .map(|entry| Self::to_message(&entry, 1))
            .collect())
    }

    /// Reclaims expired entries, or long-polls for new ones when none expired.
    async fn receive_once(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> RedisResult<Vec<ReceivedMessage>> {
        let count = max_messages.max(1);
        let mut conn = self.conn.clone();

        let reclaimed = self.claim_expired(&mut conn, count).await?;
        if !reclaimed.is_empty() {
            return Ok(reclaimed);
        }

        let deadline = Instant::now() + wait;
        loop {
            let messages = self.read_new(&mut conn, count).await?;
            let now = Instant::now();
            if !messages.is_empty() || now >= deadline {
                return Ok(messages);
            }

            let remaining = deadline - now;
            tokio::time::sleep(self.settings.poll_interval.min(remaining)).await;
        }
    }
}

/// The group disappears when Redis restarts without persistence or the
/// stream key is deleted; `XADD` alone recreates only the stream.
fn is_missing_group(error: &RedisError) -> bool {
    error.code() == Some("NOGROUP")
}

#[async_trait]
impl EventChannel for RedisStreamChannel {
    async fn publish(&self, body: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd(&self.settings.stream, "*", &[(BODY_FIELD, body)])
            .await?;

        debug!(entry_id = %id, "Published click event");
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, AppError> {
        match self.receive_once(max_messages, wait).await {
            Err(e) if is_missing_group(&e) => {
                warn!(
                    stream = %self.settings.stream,
                    group = %self.settings.group,
                    "Consumer group is missing, recreating it"
                );
                self.ensure_group().await?;
                Ok(self.receive_once(max_messages, wait).await?)
            }
            result => Ok(result?),
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .xack(&self.settings.stream, &self.settings.group, &[receipt_handle])
            .ignore()
            .xdel(&self.settings.stream, &[receipt_handle])
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn dead_letter(&self, message: &ReceivedMessage, reason: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let receive_count = message.receive_count.to_string();

        let _: () = redis::pipe()
            .atomic()
            .xadd(
                &self.settings.dead_letter_stream,
                "*",
                &[
                    (BODY_FIELD, message.body.as_str()),
                    ("reason", reason),
                    ("source_id", message.receipt_handle.as_str()),
                    ("receive_count", receive_count.as_str()),
                ],
            )
            .ignore()
            .xack(
                &self.settings.stream,
                &self.settings.group,
                &[message.receipt_handle.as_str()],
            )
            .ignore()
            .xdel(&self.settings.stream, &[message.receipt_handle.as_str()])
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        conn.ping::<()>().await.is_ok()
    }
}
