//! Pair selection
//!
//! The selector advances the user's progress counter, picks a strategy for the
//! new count, and produces two distinct, resolved, store-backed items.
//!
//! Special strategies run their top-N lookup and metadata resolution as a
//! single future raced against a timeout. Losing the race, an empty top list,
//! or any failure inside that future degrades the affected slots to plain
//! catalog draws. The losing future is dropped, so a late answer has no effect.

use crate::battle::strategy::{SelectionStrategy, SpecialSlots};
use crate::cancel::CancelSignal;
use crate::catalog::resolver::{MetadataResolver, DEFAULT_MAX_ATTEMPTS};
use crate::catalog::sampler::CatalogSampler;
use crate::error::{battle_error, BattleError, Result};
use crate::metrics::{FallbackReason, MetricsCollector};
use crate::progress::{ProgressSession, UserProgressTracker};
use crate::random::{choose, SharedRandom};
use crate::rating::storage::RatingStore;
use crate::types::{BattlePair, CatalogItem, ItemId, RatingRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tuning for pair selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Budget for the special-strategy sub-task
    pub special_timeout: Duration,
    /// Restarts allowed when a resolved item is missing from the store
    pub max_restarts: u32,
    /// Catalog redraws allowed per slot when resolution fails
    pub max_redraws: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            special_timeout: Duration::from_secs(5),
            max_restarts: 3,
            max_redraws: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// A slot candidate: either a bare title or an item already resolved
#[derive(Debug, Clone)]
enum Candidate {
    Title(String),
    Resolved(CatalogItem),
}

impl Candidate {
    fn title(&self) -> &str {
        match self {
            Candidate::Title(title) => title,
            Candidate::Resolved(item) => &item.title,
        }
    }
}

/// Items produced by a special strategy before fallback handling
#[derive(Debug, Default)]
struct SpecialPick {
    item_a: Option<CatalogItem>,
    item_b: Option<CatalogItem>,
}

/// Orchestrates progress, sampling, resolution and the rating store into pairs
pub struct PairSelector {
    tracker: Arc<UserProgressTracker>,
    sampler: Arc<dyn CatalogSampler>,
    resolver: Arc<MetadataResolver>,
    store: Arc<dyn RatingStore>,
    random: SharedRandom,
    metrics: Arc<MetricsCollector>,
    config: SelectorConfig,
}

impl PairSelector {
    pub fn new(
        tracker: Arc<UserProgressTracker>,
        sampler: Arc<dyn CatalogSampler>,
        resolver: Arc<MetadataResolver>,
        store: Arc<dyn RatingStore>,
        random: SharedRandom,
        metrics: Arc<MetricsCollector>,
        config: SelectorConfig,
    ) -> Self {
        Self {
            tracker,
            sampler,
            resolver,
            store,
            random,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select the next battle pair for a user.
    ///
    /// The user's progress entry stays locked for the whole call, so calls for
    /// one user run strictly one after another.
    pub async fn select_pair(&self, user_id: &str, cancel: &CancelSignal) -> Result<BattlePair> {
        let timer = self.metrics.start_timer();
        let result = self.select_pair_locked(user_id, cancel).await;
        self.metrics.update_tracked_users(self.tracker.user_count());

        match &result {
            Ok(pair) => {
                info!(
                    "Pair selected - user: '{}', count: {}, strategy: {}, fell_back: {}, a: '{}', b: '{}'",
                    user_id,
                    pair.battle_count,
                    pair.strategy,
                    pair.fell_back,
                    pair.item_a.title,
                    pair.item_b.title
                );
                self.metrics.record_pair_selected(pair.strategy, timer.stop());
            }
            Err(e) => {
                warn!("Pair selection failed - user: '{}', error: {}", user_id, e);
                self.metrics.record_selection_error(error_kind(e), timer.stop());
            }
        }

        result
    }

    async fn select_pair_locked(&self, user_id: &str, cancel: &CancelSignal) -> Result<BattlePair> {
        cancel.check()?;
        let mut session = tokio::select! {
            session = self.tracker.session(user_id) => session,
            _ = cancel.cancelled() => return Err(BattleError::Cancelled.into()),
        };

        let mut restarts = 0u32;
        loop {
            match self.attempt(&mut session, cancel).await {
                Ok(pair) => return Ok(pair),
                Err(e) => match battle_error(&e) {
                    Some(BattleError::UnknownItemInStore { title }) => {
                        session.reset();
                        self.metrics.record_restart();
                        restarts += 1;
                        if restarts > self.config.max_restarts {
                            return Err(BattleError::PairingUnavailable {
                                attempts: restarts,
                            }
                            .into());
                        }
                        warn!(
                            "Item missing from rating store, restarting selection - user: '{}', title: '{}', restart: {}/{}",
                            user_id, title, restarts, self.config.max_restarts
                        );
                    }
                    _ => return Err(e),
                },
            }
        }
    }

    /// One full selection pass at the next progress count
    async fn attempt(
        &self,
        session: &mut ProgressSession,
        cancel: &CancelSignal,
    ) -> Result<BattlePair> {
        let user_id = session.user_id().to_string();
        let count = session.increment();
        let strategy = SelectionStrategy::for_count(count);

        debug!(
            "Selecting pair - user: '{}', count: {}, strategy: {}",
            user_id, count, strategy
        );

        let (special, fell_back) = match strategy.special_slots() {
            Some(slots) => self.run_special(&user_id, strategy, slots, cancel).await?,
            None => (SpecialPick::default(), false),
        };

        let mut candidate_a = match special.item_a {
            Some(item) => Candidate::Resolved(item),
            None => Candidate::Title(self.draw_title(cancel).await?),
        };
        let candidate_b = match special.item_b {
            Some(item) => Candidate::Resolved(item),
            None => Candidate::Title(self.draw_title(cancel).await?),
        };

        if candidate_a.title() == candidate_b.title() {
            debug!(
                "Identical candidates, redrawing item A - user: '{}', title: '{}'",
                user_id,
                candidate_a.title()
            );
            candidate_a = Candidate::Title(self.draw_title(cancel).await?);
        }

        // A special item in slot B keeps its place; slot A steers around it
        let exclude_for_a = match &candidate_b {
            Candidate::Resolved(item) => Some(item.title.clone()),
            Candidate::Title(_) => None,
        };
        let item_a = self
            .resolve_slot('A', candidate_a, exclude_for_a.as_deref(), cancel)
            .await?;
        let item_b = self
            .resolve_slot('B', candidate_b, Some(&item_a.title), cancel)
            .await?;

        let id_a = self.cross_reference(&item_a, cancel).await?;
        let id_b = self.cross_reference(&item_b, cancel).await?;

        Ok(BattlePair {
            item_a: item_a.with_internal_id(id_a),
            item_b: item_b.with_internal_id(id_b),
            battle_count: count,
            strategy,
            fell_back,
        })
    }

    /// Race the special strategy against the timeout, degrading on any miss
    async fn run_special(
        &self,
        user_id: &str,
        strategy: SelectionStrategy,
        slots: SpecialSlots,
        cancel: &CancelSignal,
    ) -> Result<(SpecialPick, bool)> {
        let timeout = self.config.special_timeout;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BattleError::Cancelled.into()),
            outcome = tokio::time::timeout(timeout, self.special_pick(user_id, strategy, slots, cancel)) => outcome,
        };

        let reason = match outcome {
            Ok(Ok(Some(pick))) => return Ok((pick, false)),
            Ok(Ok(None)) => FallbackReason::EmptyTopList,
            Ok(Err(e)) => {
                if matches!(battle_error(&e), Some(BattleError::Cancelled)) {
                    return Err(e);
                }
                debug!("Special strategy failed - user: '{}', error: {}", user_id, e);
                FallbackReason::Failed
            }
            Err(_) => {
                let timeout_err = BattleError::SelectionTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                };
                debug!("{} - user: '{}'", timeout_err, user_id);
                FallbackReason::Timeout
            }
        };

        info!(
            "Special strategy degraded to random draw - user: '{}', strategy: {}, reason: {}",
            user_id,
            strategy,
            reason.as_str()
        );
        self.metrics.record_fallback(strategy, reason);
        Ok((SpecialPick::default(), true))
    }

    /// Top-N lookup plus resolution of the picked slots. `None` for an empty list.
    async fn special_pick(
        &self,
        user_id: &str,
        strategy: SelectionStrategy,
        slots: SpecialSlots,
        cancel: &CancelSignal,
    ) -> Result<Option<SpecialPick>> {
        let (metric, n) = strategy.ranking().ok_or_else(|| BattleError::InternalError {
            message: format!("Strategy {} has no ranking", strategy),
        })?;

        cancel.check()?;
        let top = self.store.top_n(user_id, metric, n).await?;
        if top.is_empty() {
            return Ok(None);
        }

        let mut pick = SpecialPick::default();
        if matches!(slots, SpecialSlots::ItemA | SpecialSlots::Both) {
            pick.item_a = Some(self.resolve_top_pick(&top, cancel).await?);
        }
        if matches!(slots, SpecialSlots::ItemB | SpecialSlots::Both) {
            pick.item_b = Some(self.resolve_top_pick(&top, cancel).await?);
        }
        Ok(Some(pick))
    }

    async fn resolve_top_pick(
        &self,
        top: &[RatingRecord],
        cancel: &CancelSignal,
    ) -> Result<CatalogItem> {
        let record = choose(self.random.as_ref(), top).ok_or_else(|| BattleError::InternalError {
            message: "Empty top list".to_string(),
        })?;
        self.resolver.resolve(&record.title, cancel).await
    }

    /// Resolve a slot, redrawing from the catalog when resolution fails or the
    /// result collides with `exclude`
    async fn resolve_slot(
        &self,
        slot: char,
        candidate: Candidate,
        exclude: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<CatalogItem> {
        let mut candidate = candidate;
        let mut redraws = 0u32;

        loop {
            let result = match candidate {
                Candidate::Resolved(item) => Ok(item),
                Candidate::Title(title) => self.resolver.resolve(&title, cancel).await,
            };

            match result {
                Ok(item) if exclude == Some(item.title.as_str()) => {
                    debug!(
                        "Slot {} collides with the other slot, redrawing - title: '{}'",
                        slot, item.title
                    );
                }
                Ok(item) => return Ok(item),
                Err(e) => {
                    let is_resolution_failure =
                        battle_error(&e).is_some_and(BattleError::is_resolution_failure);
                    if !is_resolution_failure {
                        return Err(e);
                    }
                    warn!("Slot {} resolution failed, redrawing - error: {}", slot, e);
                    self.metrics.record_resolution_failure(slot);
                }
            }

            if redraws >= self.config.max_redraws {
                return Err(BattleError::ResolutionExhausted { slot, redraws }.into());
            }
            redraws += 1;
            candidate = Candidate::Title(self.draw_title(cancel).await?);
        }
    }

    async fn cross_reference(&self, item: &CatalogItem, cancel: &CancelSignal) -> Result<ItemId> {
        cancel.check()?;
        self.store
            .find_internal_id(&item.title)
            .await?
            .ok_or_else(|| {
                BattleError::UnknownItemInStore {
                    title: item.title.clone(),
                }
                .into()
            })
    }

    async fn draw_title(&self, cancel: &CancelSignal) -> Result<String> {
        cancel.check()?;
        self.sampler.sample_title().await
    }
}

/// Short label for a selection error
fn error_kind(err: &anyhow::Error) -> &'static str {
    match battle_error(err) {
        Some(BattleError::CatalogEmpty) => "catalog_empty",
        Some(BattleError::ResolutionExhausted { .. }) => "resolution_exhausted",
        Some(BattleError::PairingUnavailable { .. }) => "pairing_unavailable",
        Some(BattleError::Cancelled) => "cancelled",
        Some(_) => "other",
        None => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::catalog::provider::{FailureMode, StaticMetadataProvider};
    use crate::catalog::sampler::InMemoryCatalog;
    use crate::random::SeededRandom;
    use crate::rating::storage::MockRatingStore;

    const TITLES: [&str; 12] = [
        "Alien", "Heat", "Ran", "Brazil", "Vertigo", "Psycho", "Rashomon", "Stalker", "Amadeus",
        "Fargo", "Memento", "Oldboy",
    ];

    struct Harness {
        selector: PairSelector,
        tracker: Arc<UserProgressTracker>,
        provider: Arc<StaticMetadataProvider>,
        store: Arc<MockRatingStore>,
        metrics: Arc<MetricsCollector>,
    }

    /// Hands out titles in a fixed order, then reports an empty catalog
    struct ScriptedCatalog {
        titles: std::sync::Mutex<std::collections::VecDeque<String>>,
    }

    impl ScriptedCatalog {
        fn new(titles: &[&str]) -> Self {
            Self {
                titles: std::sync::Mutex::new(titles.iter().map(|t| t.to_string()).collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CatalogSampler for ScriptedCatalog {
        async fn sample_title(&self) -> Result<String> {
            self.titles
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| BattleError::CatalogEmpty.into())
        }
    }

    fn harness_with(
        catalog: &[&str],
        store: MockRatingStore,
        provider: StaticMetadataProvider,
        config: SelectorConfig,
    ) -> Harness {
        let random: SharedRandom = Arc::new(SeededRandom::new(11));
        let sampler = Arc::new(InMemoryCatalog::new(catalog.iter().copied(), random.clone()));
        harness_with_sampler(sampler, random, store, provider, config)
    }

    fn harness_with_sampler(
        sampler: Arc<dyn CatalogSampler>,
        random: SharedRandom,
        store: MockRatingStore,
        provider: StaticMetadataProvider,
        config: SelectorConfig,
    ) -> Harness {
        let tracker = Arc::new(UserProgressTracker::new());
        let provider = Arc::new(provider);
        let store = Arc::new(store);
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let selector = PairSelector::new(
            tracker.clone(),
            sampler,
            Arc::new(MetadataResolver::new(provider.clone())),
            store.clone(),
            random,
            metrics.clone(),
            config,
        );
        Harness {
            selector,
            tracker,
            provider,
            store,
            metrics,
        }
    }

    fn harness() -> Harness {
        harness_with(
            &TITLES,
            MockRatingStore::with_titles(TITLES),
            StaticMetadataProvider::permissive(),
            SelectorConfig::default(),
        )
    }

    async fn advance_to(tracker: &UserProgressTracker, user: &str, count: u8) {
        for _ in 0..count {
            tracker.increment(user).await;
        }
    }

    #[tokio::test]
    async fn test_default_pair_is_distinct_and_referenced() {
        let h = harness();
        let pair = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(pair.battle_count, 1);
        assert_eq!(pair.strategy, SelectionStrategy::Default);
        assert!(!pair.fell_back);
        assert_ne!(pair.item_a.title, pair.item_b.title);
        assert!(pair.item_a.internal_id.is_some());
        assert!(pair.item_b.internal_id.is_some());
    }

    #[tokio::test]
    async fn test_counts_cycle_through_strategies() {
        let h = harness();
        let mut strategies = Vec::new();
        for _ in 0..11 {
            let pair = h
                .selector
                .select_pair("alice", &CancelSignal::never())
                .await
                .unwrap();
            assert_ne!(pair.item_a.title, pair.item_b.title);
            strategies.push((pair.battle_count, pair.strategy));
        }

        assert_eq!(strategies[2], (3, SelectionStrategy::TopByMatches));
        assert_eq!(strategies[4], (5, SelectionStrategy::TopByWins));
        assert_eq!(strategies[9], (10, SelectionStrategy::TopByElo));
        assert_eq!(strategies[10], (1, SelectionStrategy::Default));
    }

    #[tokio::test]
    async fn test_empty_top_list_falls_back() {
        let h = harness();
        advance_to(&h.tracker, "alice", 2).await;

        let pair = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(pair.strategy, SelectionStrategy::TopByMatches);
        assert!(pair.fell_back);
        assert_ne!(pair.item_a.title, pair.item_b.title);
        assert_eq!(
            h.metrics
                .selection()
                .fallbacks_total
                .with_label_values(&["top_by_matches", "empty_top_list"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_top_by_wins_fills_item_b() {
        let h = harness();
        let heat = h.store.find_internal_id("Heat").await.unwrap().unwrap();
        let mut record = RatingRecord::new(heat, "Heat", 1250);
        record.record_win(1266);
        h.store.preset_records("alice", vec![record]).unwrap();
        advance_to(&h.tracker, "alice", 4).await;

        let pair = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(pair.strategy, SelectionStrategy::TopByWins);
        assert!(!pair.fell_back);
        assert_eq!(pair.item_b.title, "Heat");
        assert_ne!(pair.item_a.title, "Heat");
    }

    #[tokio::test]
    async fn test_single_top_item_for_both_slots_redraws_a() {
        let h = harness();
        let ran = h.store.find_internal_id("Ran").await.unwrap().unwrap();
        h.store
            .preset_records("alice", vec![RatingRecord::new(ran, "Ran", 1300)])
            .unwrap();
        advance_to(&h.tracker, "alice", 9).await;

        let pair = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(pair.strategy, SelectionStrategy::TopByElo);
        assert!(!pair.fell_back);
        assert_eq!(pair.item_b.title, "Ran");
        assert_ne!(pair.item_a.title, "Ran");
    }

    #[tokio::test]
    async fn test_top_n_failure_falls_back() {
        let h = harness();
        h.store.set_fail_top_n(true);
        advance_to(&h.tracker, "alice", 4).await;

        let pair = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap();
        assert!(pair.fell_back);
        assert_eq!(h.store.top_n_call_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_special_strategy_times_out() {
        let provider = StaticMetadataProvider::permissive();
        let h = harness_with(
            &TITLES,
            MockRatingStore::with_titles(TITLES),
            provider,
            SelectorConfig {
                special_timeout: Duration::from_millis(30),
                ..SelectorConfig::default()
            },
        );
        h.store.set_top_n_delay(Some(Duration::from_millis(200)));
        advance_to(&h.tracker, "alice", 9).await;

        let pair = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap();
        assert!(pair.fell_back);
        assert_eq!(
            h.metrics
                .selection()
                .fallbacks_total
                .with_label_values(&["top_by_elo", "timeout"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_failing_title_is_not_retried_past_budget() {
        let provider = StaticMetadataProvider::permissive();
        provider.set_failure("Alien", FailureMode::Always);
        let h = harness_with(
            &TITLES,
            MockRatingStore::with_titles(TITLES),
            provider,
            SelectorConfig {
                max_redraws: 10,
                ..SelectorConfig::default()
            },
        );

        for _ in 0..5 {
            let pair = h
                .selector
                .select_pair("alice", &CancelSignal::never())
                .await
                .unwrap();
            assert_ne!(pair.item_a.title, "Alien");
            assert_ne!(pair.item_b.title, "Alien");
        }
        // Each draw of the failing title costs exactly three lookups
        assert_eq!(h.provider.call_count("Alien") % 3, 0);
    }

    #[tokio::test]
    async fn test_resolution_exhausted() {
        let provider = StaticMetadataProvider::new(Vec::new());
        let h = harness_with(
            &["Alien", "Heat"],
            MockRatingStore::with_titles(["Alien", "Heat"]),
            provider,
            SelectorConfig::default(),
        );

        let err = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            battle_error(&err),
            Some(BattleError::ResolutionExhausted { slot: 'A', redraws: 3 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_items_restart_then_give_up() {
        let h = harness_with(
            &TITLES,
            MockRatingStore::new(),
            StaticMetadataProvider::permissive(),
            SelectorConfig::default(),
        );

        let err = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            battle_error(&err),
            Some(BattleError::PairingUnavailable { attempts: 4 })
        ));
        assert_eq!(h.metrics.selection().restarts_total.get(), 4);
        // Counter was reset by the last restart
        assert_eq!(
            h.tracker.get("alice").await.map(|p| p.battle_count),
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_restart_resets_counter_to_one() {
        // Ran resolves but is missing from the store, forcing one restart
        let h = harness_with_sampler(
            Arc::new(ScriptedCatalog::new(&["Ran", "Heat", "Alien", "Heat"])),
            Arc::new(SeededRandom::new(11)),
            MockRatingStore::with_titles(["Alien", "Heat"]),
            StaticMetadataProvider::permissive(),
            SelectorConfig::default(),
        );
        advance_to(&h.tracker, "alice", 6).await;

        let pair = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(h.metrics.selection().restarts_total.get(), 1);
        assert_eq!(pair.battle_count, 1);
        assert_eq!(pair.strategy, SelectionStrategy::Default);
        assert_eq!(pair.item_a.title, "Alien");
        assert_eq!(pair.item_b.title, "Heat");
        assert_eq!(
            h.tracker.get("alice").await.map(|p| p.battle_count),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let h = harness_with(
            &[],
            MockRatingStore::new(),
            StaticMetadataProvider::permissive(),
            SelectorConfig::default(),
        );
        let err = h
            .selector
            .select_pair("alice", &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(battle_error(&err), Some(BattleError::CatalogEmpty)));
    }

    #[tokio::test]
    async fn test_cancelled_selection() {
        let h = harness();
        let handle = CancelHandle::new();
        handle.cancel();

        let err = h
            .selector
            .select_pair("alice", &handle.signal())
            .await
            .unwrap_err();
        assert!(matches!(battle_error(&err), Some(BattleError::Cancelled)));
        assert_eq!(h.provider.total_calls(), 0);
    }
}
