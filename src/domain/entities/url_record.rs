//! URL record entity representing a shortened URL mapping.

use chrono::{DateTime, Utc};

/// A stored mapping from a short code to its long URL.
///
/// Records are created once by the shorten operation and never mutated.
/// `short_code` is always `base62::encode(id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub id: u64,
    pub short_code: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
}

impl UrlRecord {
    /// Creates a new UrlRecord instance.
    pub fn new(id: u64, short_code: String, long_url: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            short_code,
            long_url,
            created_at,
        }
    }
}

/// Input data for persisting a new URL record.
///
/// The id comes from the [`crate::domain::id_allocator::IdAllocator`]; the
/// creation timestamp is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrlRecord {
    pub id: u64,
    pub short_code: String,
    pub long_url: String,
}

/// Aggregated click count for one URL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlAnalytics {
    pub short_code: String,
    pub long_url: String,
    pub click_count: i64,
}
