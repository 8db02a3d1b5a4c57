//! Rating storage interface and implementations
//!
//! This module defines the interface for persisting and retrieving per-user
//! rating records, with an in-memory implementation and a mock for tests.

use crate::error::{BattleError, Result};
use crate::types::{ItemId, RankingMetric, RatingRecord, UserId};
use crate::utils::generate_item_id;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Trait for rating storage operations
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Get a user's record for an item, if the user has ever rated it
    async fn get_rating_record(&self, user_id: &str, item_id: &ItemId)
        -> Result<Option<RatingRecord>>;

    /// Store or replace a single record
    async fn put_rating_record(&self, user_id: &str, record: RatingRecord) -> Result<()>;

    /// Store several records atomically: either all land or none do
    async fn put_rating_records(&self, user_id: &str, records: Vec<RatingRecord>) -> Result<()>;

    /// A user's top `n` records by `metric`, highest first
    async fn top_n(&self, user_id: &str, metric: RankingMetric, n: usize)
        -> Result<Vec<RatingRecord>>;

    /// Internal identifier for a catalog title
    async fn find_internal_id(&self, title: &str) -> Result<Option<ItemId>>;
}

fn read_lock_error(what: &str) -> anyhow::Error {
    BattleError::InternalError {
        message: format!("Failed to acquire {} read lock", what),
    }
    .into()
}

fn write_lock_error(what: &str) -> anyhow::Error {
    BattleError::InternalError {
        message: format!("Failed to acquire {} write lock", what),
    }
    .into()
}

/// Sort records by `metric` descending, ties broken by title
fn rank_records(mut records: Vec<RatingRecord>, metric: RankingMetric, n: usize) -> Vec<RatingRecord> {
    records.sort_by(|a, b| {
        metric
            .value_of(b)
            .cmp(&metric.value_of(a))
            .then_with(|| a.title.cmp(&b.title))
    });
    records.truncate(n);
    records
}

/// In-memory rating storage implementation
#[derive(Debug, Default)]
pub struct InMemoryRatingStore {
    /// Catalog directory: title to internal id
    items: RwLock<HashMap<String, ItemId>>,
    /// Per-user records keyed by item
    records: RwLock<HashMap<UserId, HashMap<ItemId, RatingRecord>>>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose item directory assigns a fresh id to every title
    pub fn with_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut items) = store.items.write() {
            for title in titles {
                items.entry(title.into()).or_insert_with(generate_item_id);
            }
        }
        store
    }

    /// Register a title, returning its id (existing ids are kept)
    pub fn register_item(&self, title: &str) -> Result<ItemId> {
        let mut items = self.items.write().map_err(|_| write_lock_error("items"))?;
        Ok(*items
            .entry(title.to_string())
            .or_insert_with(generate_item_id))
    }

    pub fn item_count(&self) -> Result<usize> {
        let items = self.items.read().map_err(|_| read_lock_error("items"))?;
        Ok(items.len())
    }

    /// All records held for a user
    pub fn user_records(&self, user_id: &str) -> Result<Vec<RatingRecord>> {
        let records = self.records.read().map_err(|_| read_lock_error("records"))?;
        Ok(records
            .get(user_id)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn get_rating_record(
        &self,
        user_id: &str,
        item_id: &ItemId,
    ) -> Result<Option<RatingRecord>> {
        let records = self.records.read().map_err(|_| read_lock_error("records"))?;
        Ok(records
            .get(user_id)
            .and_then(|r| r.get(item_id))
            .cloned())
    }

    async fn put_rating_record(&self, user_id: &str, record: RatingRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| write_lock_error("records"))?;
        records
            .entry(user_id.to_string())
            .or_default()
            .insert(record.item_id, record);
        Ok(())
    }

    async fn put_rating_records(&self, user_id: &str, batch: Vec<RatingRecord>) -> Result<()> {
        // One write guard covers the whole batch
        let mut records = self
            .records
            .write()
            .map_err(|_| write_lock_error("records"))?;
        let user_records = records.entry(user_id.to_string()).or_default();
        for record in batch {
            user_records.insert(record.item_id, record);
        }
        Ok(())
    }

    async fn top_n(
        &self,
        user_id: &str,
        metric: RankingMetric,
        n: usize,
    ) -> Result<Vec<RatingRecord>> {
        let records = self.records.read().map_err(|_| read_lock_error("records"))?;
        let user_records = records
            .get(user_id)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default();
        Ok(rank_records(user_records, metric, n))
    }

    async fn find_internal_id(&self, title: &str) -> Result<Option<ItemId>> {
        let items = self.items.read().map_err(|_| read_lock_error("items"))?;
        Ok(items.get(title).copied())
    }
}

/// Mock rating storage for testing
///
/// Wraps an [`InMemoryRatingStore`] and adds failure injection, artificial
/// latency on top-N reads, and call recording.
#[derive(Debug, Default)]
pub struct MockRatingStore {
    inner: InMemoryRatingStore,
    put_calls: RwLock<Vec<(UserId, Vec<RatingRecord>)>>,
    top_n_calls: AtomicU32,
    find_calls: RwLock<Vec<String>>,
    fail_puts: AtomicBool,
    fail_top_n: AtomicBool,
    top_n_delay: RwLock<Option<Duration>>,
}

impl MockRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: InMemoryRatingStore::with_titles(titles),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryRatingStore {
        &self.inner
    }

    /// Make every write fail until cleared
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every top-N read fail until cleared
    pub fn set_fail_top_n(&self, fail: bool) {
        self.fail_top_n.store(fail, Ordering::SeqCst);
    }

    /// Delay every top-N read
    pub fn set_top_n_delay(&self, delay: Option<Duration>) {
        if let Ok(mut current) = self.top_n_delay.write() {
            *current = delay;
        }
    }

    /// Preset records for a user (for testing)
    pub fn preset_records(&self, user_id: &str, records: Vec<RatingRecord>) -> Result<()> {
        let mut all = self
            .inner
            .records
            .write()
            .map_err(|_| write_lock_error("records"))?;
        let user_records = all.entry(user_id.to_string()).or_default();
        for record in records {
            user_records.insert(record.item_id, record);
        }
        Ok(())
    }

    /// Get all write calls made (for testing)
    pub fn get_put_calls(&self) -> Vec<(UserId, Vec<RatingRecord>)> {
        self.put_calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn top_n_call_count(&self) -> u32 {
        self.top_n_calls.load(Ordering::SeqCst)
    }

    /// Titles looked up through find_internal_id (for testing)
    pub fn get_find_calls(&self) -> Vec<String> {
        self.find_calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record_put(&self, user_id: &str, records: Vec<RatingRecord>) {
        if let Ok(mut calls) = self.put_calls.write() {
            calls.push((user_id.to_string(), records));
        }
    }

    fn check_puts(&self) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RatingStore for MockRatingStore {
    async fn get_rating_record(
        &self,
        user_id: &str,
        item_id: &ItemId,
    ) -> Result<Option<RatingRecord>> {
        self.inner.get_rating_record(user_id, item_id).await
    }

    async fn put_rating_record(&self, user_id: &str, record: RatingRecord) -> Result<()> {
        self.record_put(user_id, vec![record.clone()]);
        self.check_puts()?;
        self.inner.put_rating_record(user_id, record).await
    }

    async fn put_rating_records(&self, user_id: &str, records: Vec<RatingRecord>) -> Result<()> {
        self.record_put(user_id, records.clone());
        self.check_puts()?;
        self.inner.put_rating_records(user_id, records).await
    }

    async fn top_n(
        &self,
        user_id: &str,
        metric: RankingMetric,
        n: usize,
    ) -> Result<Vec<RatingRecord>> {
        self.top_n_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.top_n_delay.read().map(|d| *d).unwrap_or(None);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_top_n.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Injected top-N failure"));
        }

        self.inner.top_n(user_id, metric, n).await
    }

    async fn find_internal_id(&self, title: &str) -> Result<Option<ItemId>> {
        if let Ok(mut calls) = self.find_calls.write() {
            calls.push(title.to_string());
        }
        self.inner.find_internal_id(title).await
    }
}
