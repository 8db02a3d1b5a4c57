//! Metadata resolution with bounded retry

use crate::cancel::CancelSignal;
use crate::catalog::provider::{MetadataLookup, MetadataProvider};
use crate::error::{BattleError, Result};
use crate::types::CatalogItem;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of provider calls per title
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Resolves candidate titles into catalog items through a [`MetadataProvider`]
pub struct MetadataResolver {
    provider: Arc<dyn MetadataProvider>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::ZERO,
        }
    }

    /// Set the attempt budget per title (at least one attempt is always made)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Resolve a title into an unreferenced catalog item.
    ///
    /// Transient provider failures are retried up to the attempt budget; a
    /// not-found answer is returned immediately.
    pub async fn resolve(&self, title: &str, cancel: &CancelSignal) -> Result<CatalogItem> {
        for attempt in 1..=self.max_attempts {
            cancel.check()?;

            match self.provider.lookup(title).await {
                Ok(MetadataLookup::Found(details)) => {
                    debug!(
                        "Resolved metadata - title: '{}', external_id: '{}', attempt: {}",
                        title, details.external_id, attempt
                    );
                    return Ok(CatalogItem::from_details(details));
                }
                Ok(MetadataLookup::NotFound) => {
                    debug!("Metadata not found - title: '{}'", title);
                    return Err(BattleError::MetadataNotFound {
                        title: title.to_string(),
                    }
                    .into());
                }
                Err(e) => {
                    warn!(
                        "Metadata lookup failed - title: '{}', attempt: {}/{}, error: {}",
                        title, attempt, self.max_attempts, e
                    );
                    if attempt < self.max_attempts && !self.retry_delay.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(self.retry_delay) => {}
                            _ = cancel.cancelled() => return Err(BattleError::Cancelled.into()),
                        }
                    }
                }
            }
        }

        Err(BattleError::TransientResolutionFailure {
            title: title.to_string(),
            attempts: self.max_attempts,
        }
        .into())
    }
}
