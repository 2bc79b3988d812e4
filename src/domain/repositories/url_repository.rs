//! Repository trait for URL record storage.

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for shortened URL records.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgUrlRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryStore`] - In-process implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Inserts a new URL record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the id or short code already exists.
    /// Returns [`AppError::Unavailable`] if the store cannot be reached.
    async fn save(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError>;

    /// Returns the long URL stored for `short_code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no record has this code.
    async fn load(&self, short_code: &str) -> Result<String, AppError>;

    /// Returns the id of the record stored for `short_code`.
    ///
    /// Used by the click consumer to turn a message body into a foreign key.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown (stale or malformed) codes.
    async fn resolve_id(&self, short_code: &str) -> Result<u64, AppError>;

    /// Returns the largest persisted id, or 0 when no records exist.
    ///
    /// Called once at startup to seed the allocator.
    async fn max_id(&self) -> Result<u64, AppError>;

    /// Reports whether the store is reachable.
    async fn health_check(&self) -> bool;
}
