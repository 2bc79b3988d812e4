//! Click entity representing a single processed redirect.

use chrono::{DateTime, Utc};

/// A persisted click, appended once per successfully processed click event.
///
/// Clicks are never updated or deleted. Redelivered events may append more
/// than one click for the same visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Click {
    pub id: i64,
    pub url_id: u64,
    pub created_at: DateTime<Utc>,
}

impl Click {
    pub fn new(id: i64, url_id: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            url_id,
            created_at,
        }
    }
}
