//! Metadata provider interface and an in-memory implementation

use crate::error::Result;
use crate::types::ItemDetails;
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Definite answer from a metadata provider. Transient failures are `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataLookup {
    Found(ItemDetails),
    NotFound,
}

/// External source of display metadata for catalog titles
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn lookup(&self, title: &str) -> Result<MetadataLookup>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Scripted failure for a title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Fail the next `n` lookups, then answer normally
    Transient(u32),
    /// Every lookup fails
    Always,
}

/// Provider backed by an in-memory title table
///
/// Used for offline runs and tests. Lookups can be delayed and failures
/// injected per title; call and completion counters expose what happened.
#[derive(Debug, Default)]
pub struct StaticMetadataProvider {
    details: RwLock<HashMap<String, ItemDetails>>,
    failures: RwLock<HashMap<String, FailureMode>>,
    calls: RwLock<HashMap<String, u32>>,
    completed_by_title: RwLock<HashMap<String, u32>>,
    delays: RwLock<HashMap<String, Duration>>,
    resolve_unknown: bool,
    completed: AtomicU64,
}

impl StaticMetadataProvider {
    /// Provider that only knows the titles it is given
    pub fn new(details: impl IntoIterator<Item = ItemDetails>) -> Self {
        Self {
            details: RwLock::new(
                details
                    .into_iter()
                    .map(|d| (d.title.clone(), d))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Provider that resolves any title to bare details
    pub fn permissive() -> Self {
        Self {
            resolve_unknown: true,
            ..Self::default()
        }
    }

    /// Delay lookups of one title
    pub fn set_delay(&self, title: &str, delay: Duration) {
        if let Ok(mut delays) = self.delays.write() {
            delays.insert(title.to_string(), delay);
        }
    }

    pub fn set_failure(&self, title: &str, mode: FailureMode) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(title.to_string(), mode);
        }
    }

    /// Lookups started for a title (for testing)
    pub fn call_count(&self, title: &str) -> u32 {
        self.calls
            .read()
            .map(|calls| calls.get(title).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Lookups started across all titles
    pub fn total_calls(&self) -> u32 {
        self.calls
            .read()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    /// Lookups that ran to completion, after any delay
    pub fn completed_lookups(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Lookups of a title that ran to completion
    pub fn completed_count(&self, title: &str) -> u32 {
        self.completed_by_title
            .read()
            .map(|done| done.get(title).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn title_delay(&self, title: &str) -> Option<Duration> {
        self.delays
            .read()
            .ok()
            .and_then(|delays| delays.get(title).copied())
    }

    fn record_completion(&self, title: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut done) = self.completed_by_title.write() {
            *done.entry(title.to_string()).or_insert(0) += 1;
        }
    }

    fn record_call(&self, title: &str) {
        if let Ok(mut calls) = self.calls.write() {
            *calls.entry(title.to_string()).or_insert(0) += 1;
        }
    }

    /// Consume one scripted failure for `title`, if any
    fn take_failure(&self, title: &str) -> Result<bool> {
        let mut failures = self
            .failures
            .write()
            .map_err(|_| anyhow!("Failed to acquire failure schedule lock"))?;

        let fail = match failures.get_mut(title) {
            Some(FailureMode::Always) => true,
            Some(FailureMode::Transient(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        Ok(fail)
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadataProvider {
    async fn lookup(&self, title: &str) -> Result<MetadataLookup> {
        self.record_call(title);

        if let Some(delay) = self.title_delay(title) {
            tokio::time::sleep(delay).await;
        }
        self.record_completion(title);

        if self.take_failure(title)? {
            return Err(anyhow!("Injected provider failure for '{}'", title));
        }

        let table = self
            .details
            .read()
            .map_err(|_| anyhow!("Failed to acquire metadata table lock"))?;

        match table.get(title) {
            Some(details) => Ok(MetadataLookup::Found(details.clone())),
            None if self.resolve_unknown => Ok(MetadataLookup::Found(ItemDetails::bare(title))),
            None => Ok(MetadataLookup::NotFound),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}
