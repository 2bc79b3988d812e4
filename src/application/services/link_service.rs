//! Short link creation and resolution.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::domain::id_allocator::IdAllocator;
use crate::domain::repositories::{DEFAULT_STORE_TIMEOUT, UrlRepository, with_store_timeout};
use crate::error::AppError;
use crate::utils::base62;

/// Service for creating and resolving short links.
///
/// Every new link takes the next id from the process-local [`IdAllocator`];
/// its short code is the base-62 encoding of that id. Store calls are bounded
/// by the store timeout and report [`AppError::Unavailable`] when it elapses.
pub struct LinkService {
    urls: Arc<dyn UrlRepository>,
    allocator: Arc<IdAllocator>,
    base_url: String,
    store_timeout: Duration,
}

impl LinkService {
    /// Creates a new link service.
    ///
    /// `base_url` is the public origin prefixed to short codes; a trailing
    /// slash is ignored.
    pub fn new(
        urls: Arc<dyn UrlRepository>,
        allocator: Arc<IdAllocator>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            urls,
            allocator,
            base_url,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Overrides the upper bound on each store call.
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Allocates an id, encodes it and persists the record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `long_url` is blank.
    /// Returns [`AppError::Unavailable`] if the store cannot be reached in time.
    /// Returns [`AppError::Internal`] if the allocator is exhausted or hands out
    /// an id that already exists in the store.
    pub async fn shorten(&self, long_url: &str) -> Result<UrlRecord, AppError> {
        let long_url = long_url.trim();
        if long_url.is_empty() {
            return Err(AppError::bad_request(
                "URL must not be empty",
                json!({ "field": "url" }),
            ));
        }

        let id = self.allocator.next()?;
        let short_code = base62::encode(id);

        let new_record = NewUrlRecord {
            id,
            short_code,
            long_url: long_url.to_string(),
        };
        let record = with_store_timeout(self.store_timeout, self.urls.save(new_record))
            .await
            .map_err(|e| match e {
                AppError::Conflict { details, .. } => {
                    error!(id, "Allocated id already exists in the store");
                    AppError::internal("Identifier collision", details)
                }
                other => other,
            })?;

        info!(id = record.id, short_code = %record.short_code, "Created short link");

        Ok(record)
    }

    /// Returns the long URL behind `short_code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the code is unknown.
    /// Returns [`AppError::Unavailable`] if the store cannot be reached in time.
    pub async fn resolve(&self, short_code: &str) -> Result<String, AppError> {
        with_store_timeout(self.store_timeout, self.urls.load(short_code)).await
    }

    /// Public URL for a short code.
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url, short_code)
    }

    /// Reports whether the URL store is reachable.
    pub async fn store_healthy(&self) -> bool {
        match tokio::time::timeout(self.store_timeout, self.urls.health_check()).await {
            Ok(healthy) => healthy,
            Err(_) => {
                warn!("Store health check timed out");
                false
            }
        }
    }
}
