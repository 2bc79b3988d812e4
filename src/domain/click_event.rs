//! Click event model carried through the event channel.

/// A click on a short link, waiting to be recorded.
///
/// On the wire the event is nothing but its short code: the message body is
/// the literal code string, with no envelope or schema version.
///
/// # Usage Flow
///
/// 1. Created in the redirect handler after a successful lookup
/// 2. Submitted to [`crate::application::click_publisher::ClickPublisher`] (non-blocking)
/// 3. Published to the [`crate::domain::event_channel::EventChannel`]
/// 4. Parsed back by [`crate::domain::click_worker::ClickConsumer`] and persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub short_code: String,
}

impl ClickEvent {
    pub fn new(short_code: impl Into<String>) -> Self {
        Self {
            short_code: short_code.into(),
        }
    }

    /// Message body published for this event.
    pub fn body(&self) -> &str {
        &self.short_code
    }

    /// Parses a received message body.
    ///
    /// Surrounding whitespace is ignored. Returns `None` for an empty body,
    /// which can never resolve to a URL record.
    pub fn from_body(body: &str) -> Option<Self> {
        let code = body.trim();
        if code.is_empty() {
            None
        } else {
            Some(Self::new(code))
        }
    }
}
