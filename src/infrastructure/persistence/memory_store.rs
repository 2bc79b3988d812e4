//! In-process implementation of the durable store.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::entities::{Click, NewUrlRecord, UrlAnalytics, UrlRecord};
use crate::domain::repositories::{ClickRepository, UrlRepository};
use crate::error::AppError;

#[derive(Default)]
struct Tables {
    urls: BTreeMap<u64, UrlRecord>,
    ids_by_code: HashMap<String, u64>,
    clicks: Vec<Click>,
}

/// A store that keeps URL and click records in memory.
///
/// Implements both [`UrlRepository`] and [`ClickRepository`] with the same
/// semantics as the PostgreSQL repositories, including conflict and
/// foreign-key errors. Used for local development and tests; data is lost on
/// restart.
///
/// [`MemoryStore::set_unavailable`] simulates an unreachable store: every
/// operation then fails with [`AppError::Unavailable`].
/// [`MemoryStore::set_stalled`] simulates a hung query: every operation then
/// waits forever, leaving the deadline to the caller.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    stalled: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles simulated store outages.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Toggles simulated hung queries.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    async fn stall_if_requested(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    fn not_found(short_code: &str) -> AppError {
        AppError::not_found("Short link not found", json!({ "code": short_code }))
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::unavailable(
                "Database unavailable",
                json!({ "reason": "simulated outage" }),
            ));
        }

        Ok(self.tables.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl UrlRepository for MemoryStore {
    async fn save(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError> {
        self.stall_if_requested().await;
        let mut tables = self.tables()?;

        if tables.urls.contains_key(&new_record.id)
            || tables.ids_by_code.contains_key(&new_record.short_code)
        {
            return Err(AppError::conflict(
                "Unique constraint violation",
                json!({ "id": new_record.id, "code": new_record.short_code }),
            ));
        }

        let record = UrlRecord::new(
            new_record.id,
            new_record.short_code,
            new_record.long_url,
            Utc::now(),
        );
        tables
            .ids_by_code
            .insert(record.short_code.clone(), record.id);
        tables.urls.insert(record.id, record.clone());

        Ok(record)
    }

    async fn load(&self, short_code: &str) -> Result<String, AppError> {
        self.stall_if_requested().await;
        let tables = self.tables()?;

        tables
            .ids_by_code
            .get(short_code)
            .and_then(|id| tables.urls.get(id))
            .map(|record| record.long_url.clone())
            .ok_or_else(|| Self::not_found(short_code))
    }

    async fn resolve_id(&self, short_code: &str) -> Result<u64, AppError> {
        self.stall_if_requested().await;
        let tables = self.tables()?;

        tables
            .ids_by_code
            .get(short_code)
            .copied()
            .ok_or_else(|| Self::not_found(short_code))
    }

    async fn max_id(&self) -> Result<u64, AppError> {
        self.stall_if_requested().await;
        let tables = self.tables()?;
        Ok(tables.urls.keys().next_back().copied().unwrap_or(0))
    }

    async fn health_check(&self) -> bool {
        self.stall_if_requested().await;
        !self.unavailable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClickRepository for MemoryStore {
    async fn record_click(&self, url_id: u64) -> Result<Click, AppError> {
        self.stall_if_requested().await;
        let mut tables = self.tables()?;

        if !tables.urls.contains_key(&url_id) {
            return Err(AppError::not_found(
                "Referenced record does not exist",
                json!({ "url_id": url_id }),
            ));
        }

        let click = Click::new(tables.clicks.len() as i64 + 1, url_id, Utc::now());
        tables.clicks.push(click.clone());

        Ok(click)
    }

    async fn aggregate_clicks(&self) -> Result<Vec<UrlAnalytics>, AppError> {
        self.stall_if_requested().await;
        let tables = self.tables()?;

        let mut counts: HashMap<u64, i64> = HashMap::new();
        for click in &tables.clicks {
            *counts.entry(click.url_id).or_default() += 1;
        }

        // BTreeMap iteration is id-ordered and the sort is stable, so ties keep id order.
        let mut rows: Vec<UrlAnalytics> = tables
            .urls
            .values()
            .map(|record| UrlAnalytics {
                short_code: record.short_code.clone(),
                long_url: record.long_url.clone(),
                click_count: counts.get(&record.id).copied().unwrap_or(0),
            })
            .collect();
        rows.sort_by(|a, b| b.click_count.cmp(&a.click_count));

        Ok(rows)
    }

    async fn count_clicks(&self, url_id: u64) -> Result<i64, AppError> {
        self.stall_if_requested().await;
        let tables = self.tables()?;
        Ok(tables.clicks.iter().filter(|c| c.url_id == url_id).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(id: u64, code: &str, url: &str) -> NewUrlRecord {
        NewUrlRecord {
            id,
            short_code: code.to_string(),
            long_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemoryStore::new();
        store
            .save(new_record(1, "1", "https://example.com"))
            .await
            .unwrap();

        assert_eq!(store.load("1").await.unwrap(), "https://example.com");
        assert_eq!(store.resolve_id("1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_unknown_code() {
        let store = MemoryStore::new();
        assert!(store.load("missing").await.unwrap_err().is_not_found());
        assert!(store.resolve_id("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_id_or_code_conflicts() {
        let store = MemoryStore::new();
        store.save(new_record(1, "1", "https://a.test")).await.unwrap();

        let dup_id = store.save(new_record(1, "x", "https://b.test")).await;
        assert!(matches!(dup_id, Err(AppError::Conflict { .. })));

        let dup_code = store.save(new_record(2, "1", "https://b.test")).await;
        assert!(matches!(dup_code, Err(AppError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_max_id() {
        let store = MemoryStore::new();
        assert_eq!(store.max_id().await.unwrap(), 0);

        for id in [1, 2, 5] {
            store
                .save(new_record(id, &id.to_string(), "https://a.test"))
                .await
                .unwrap();
        }

        assert_eq!(store.max_id().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_record_click_requires_existing_url() {
        let store = MemoryStore::new();
        assert!(store.record_click(9).await.unwrap_err().is_not_found());
        assert_eq!(store.count_clicks(9).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_aggregate_includes_zero_click_urls() {
        let store = MemoryStore::new();
        store.save(new_record(1, "1", "https://b.test")).await.unwrap();
        store.save(new_record(2, "2", "https://a.test")).await.unwrap();
        for _ in 0..3 {
            store.record_click(2).await.unwrap();
        }

        let rows = store.aggregate_clicks().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].short_code, "2");
        assert_eq!(rows[0].click_count, 3);
        assert_eq!(rows[1].short_code, "1");
        assert_eq!(rows[1].click_count, 0);
    }

    #[tokio::test]
    async fn test_simulated_outage() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(!store.health_check().await);

        assert!(store.max_id().await.unwrap_err().is_unavailable());
        assert!(store.record_click(1).await.unwrap_err().is_unavailable());

        store.set_unavailable(false);
        assert_eq!(store.max_id().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_simulated_stall() {
        let store = MemoryStore::new();
        store.set_stalled(true);

        let stalled =
            tokio::time::timeout(std::time::Duration::from_millis(20), store.load("1")).await;
        assert!(stalled.is_err());

        store.set_stalled(false);
        assert!(store.load("1").await.unwrap_err().is_not_found());
    }
}
