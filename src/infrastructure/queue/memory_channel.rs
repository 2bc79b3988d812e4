//! In-process event channel with visibility-timeout redelivery.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::event_channel::{EventChannel, ReceivedMessage};
use crate::error::AppError;

struct Entry {
    id: u64,
    body: String,
    receive_count: u32,
    visible_at: Instant,
}

/// A message moved aside by [`EventChannel::dead_letter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub body: String,
    pub reason: String,
    pub receive_count: u32,
}

#[derive(Default)]
struct Queue {
    next_id: u64,
    entries: Vec<Entry>,
    dead_letters: Vec<DeadLetter>,
}

/// An at-least-once queue held in process memory.
///
/// Mirrors the delivery contract of a hosted queue: a received message becomes
/// invisible for the visibility timeout and is handed out again, with a higher
/// receive count, unless it is deleted first. Receipt handles are message ids.
pub struct MemoryChannel {
    queue: Mutex<Queue>,
    published: Notify,
    visibility_timeout: Duration,
    unavailable: AtomicBool,
}

impl MemoryChannel {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            published: Notify::new(),
            visibility_timeout,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Toggles simulated outages: every operation then fails with [`AppError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of messages not yet deleted, visible or in flight.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages moved to the dead-letter list so far.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::unavailable(
                "Event channel unavailable",
                json!({ "reason": "simulated outage" }),
            ));
        }
        Ok(())
    }

    fn parse_handle(receipt_handle: &str) -> Result<u64, AppError> {
        receipt_handle.parse().map_err(|_| {
            AppError::bad_request(
                "Malformed receipt handle",
                json!({ "receipt_handle": receipt_handle }),
            )
        })
    }

    /// Claims up to `max` visible messages, or reports when the next hidden one reappears.
    fn claim(&self, max: usize) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut queue = self.lock();
        let mut claimed = Vec::new();
        let mut next_visible: Option<Instant> = None;

        for entry in queue.entries.iter_mut() {
            if entry.visible_at <= now {
                if claimed.len() == max {
                    break;
                }
                entry.receive_count += 1;
                entry.visible_at = now + self.visibility_timeout;
                claimed.push(ReceivedMessage::new(
                    entry.body.clone(),
                    entry.id.to_string(),
                    entry.receive_count,
                ));
            } else {
                next_visible = Some(
                    next_visible.map_or(entry.visible_at, |t| t.min(entry.visible_at)),
                );
            }
        }

        (claimed, next_visible)
    }
}

#[async_trait]
impl EventChannel for MemoryChannel {
    async fn publish(&self, body: &str) -> Result<(), AppError> {
        self.check_available()?;

        {
            let mut queue = self.lock();
            queue.next_id += 1;
            let id = queue.next_id;
            queue.entries.push(Entry {
                id,
                body: body.to_string(),
                receive_count: 0,
                visible_at: Instant::now(),
            });
        }
        self.published.notify_waiters();

        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, AppError> {
        self.check_available()?;

        let deadline = Instant::now() + wait;
        let max_messages = max_messages.max(1);

        loop {
            // Registered before claiming so a publish in between is not missed.
            let published = self.published.notified();

            let (claimed, next_visible) = self.claim(max_messages);
            if !claimed.is_empty() {
                return Ok(claimed);
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            let wake_at = next_visible.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = published => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), AppError> {
        self.check_available()?;
        let id = Self::parse_handle(receipt_handle)?;

        self.lock().entries.retain(|entry| entry.id != id);
        Ok(())
    }

    async fn dead_letter(&self, message: &ReceivedMessage, reason: &str) -> Result<(), AppError> {
        self.check_available()?;
        let id = Self::parse_handle(&message.receipt_handle)?;

        let mut queue = self.lock();
        queue.entries.retain(|entry| entry.id != id);
        queue.dead_letters.push(DeadLetter {
            body: message.body.clone(),
            reason: reason.to_string(),
            receive_count: message.receive_count,
        });

        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}
