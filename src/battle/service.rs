//! Battle service facade
//!
//! Wires the progress tracker, pair selector and rating engine together from
//! an [`AppConfig`] and the collaborators supplied by the host application.

use crate::battle::selector::PairSelector;
use crate::cancel::CancelSignal;
use crate::catalog::provider::MetadataProvider;
use crate::catalog::resolver::MetadataResolver;
use crate::catalog::sampler::CatalogSampler;
use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::progress::{UserProgress, UserProgressTracker};
use crate::random::SharedRandom;
use crate::rating::elo::EloRatingCalculator;
use crate::rating::engine::RatingEngine;
use crate::rating::storage::RatingStore;
use crate::types::{BattleOutcome, BattlePair, RankingMetric, RatingRecord, RatingUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// External collaborators the engine runs against
pub struct ServiceComponents {
    pub sampler: Arc<dyn CatalogSampler>,
    pub provider: Arc<dyn MetadataProvider>,
    pub store: Arc<dyn RatingStore>,
    pub random: SharedRandom,
}

/// Entry point for a thin web layer: pairs, outcomes and listings
pub struct BattleService {
    tracker: Arc<UserProgressTracker>,
    selector: PairSelector,
    engine: RatingEngine,
    store: Arc<dyn RatingStore>,
    metrics: Arc<MetricsCollector>,
    config: AppConfig,
}

impl BattleService {
    /// Build the service with its own metrics registry
    pub fn new(config: AppConfig, components: ServiceComponents) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);
        Self::with_metrics(config, components, metrics)
    }

    /// Build the service reporting into an existing metrics collector
    pub fn with_metrics(
        config: AppConfig,
        components: ServiceComponents,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        crate::config::validate_config(&config)?;

        let tracker = Arc::new(UserProgressTracker::new());
        let resolver = Arc::new(
            MetadataResolver::new(components.provider)
                .with_max_attempts(config.resolver.max_attempts)
                .with_retry_delay(config.resolver_retry_delay()),
        );
        let calculator = Arc::new(EloRatingCalculator::new(config.elo_config())?);

        info!(
            "Initializing battle service - name: '{}', provider: '{}', special timeout: {}ms, k: {}",
            config.service.name,
            resolver.provider_name(),
            config.selection.special_timeout_ms,
            config.rating.k_factor
        );

        let selector = PairSelector::new(
            tracker.clone(),
            components.sampler,
            resolver,
            components.store.clone(),
            components.random,
            metrics.clone(),
            config.selector_config(),
        );
        let engine = RatingEngine::new(components.store.clone(), calculator, metrics.clone());

        Ok(Self {
            tracker,
            selector,
            engine,
            store: components.store,
            metrics,
            config,
        })
    }

    /// Select the next battle pair for a user
    pub async fn select_pair(&self, user_id: &str, cancel: &CancelSignal) -> Result<BattlePair> {
        self.selector.select_pair(user_id, cancel).await
    }

    /// Apply a decided battle to the user's ratings
    pub async fn apply_outcome(
        &self,
        user_id: &str,
        outcome: &BattleOutcome,
        cancel: &CancelSignal,
    ) -> Result<RatingUpdate> {
        self.engine.apply_outcome(user_id, outcome, cancel).await
    }

    /// A user's top `n` records by `metric`
    pub async fn top_items(
        &self,
        user_id: &str,
        metric: RankingMetric,
        n: usize,
    ) -> Result<Vec<RatingRecord>> {
        debug!(
            "Listing top items - user: '{}', metric: {}, n: {}",
            user_id, metric, n
        );
        self.store.top_n(user_id, metric, n).await
    }

    /// Current progress for a user, if any
    pub async fn progress(&self, user_id: &str) -> Option<UserProgress> {
        self.tracker.get(user_id).await
    }

    /// Run one idle-pruning pass with the configured TTL
    pub fn prune_idle_progress(&self) -> usize {
        prune_pass(&self.tracker, &self.metrics, self.config.progress_idle_ttl())
    }

    /// Spawn the periodic idle-pruning task
    pub fn start_prune_task(&self) -> JoinHandle<()> {
        info!(
            "Starting progress prune task - interval: {}s, ttl: {}s",
            self.config.progress.prune_interval_seconds, self.config.progress.idle_ttl_seconds
        );

        let tracker = self.tracker.clone();
        let metrics = self.metrics.clone();
        let interval = self.config.prune_interval();
        let max_idle = self.config.progress_idle_ttl();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = prune_pass(&tracker, &metrics, max_idle);
                debug!(
                    "Progress prune pass - removed: {}, remaining: {}",
                    removed,
                    tracker.user_count()
                );
            }
        })
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Prune idle progress records and report the pass to metrics
fn prune_pass(
    tracker: &UserProgressTracker,
    metrics: &MetricsCollector,
    max_idle: Duration,
) -> usize {
    let removed = tracker.prune_idle(max_idle);
    metrics.record_pruned(removed);
    metrics.update_tracked_users(tracker.user_count());
    removed
}
