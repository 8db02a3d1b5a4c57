//! Applying battle outcomes to a user's ratings

use crate::cancel::CancelSignal;
use crate::error::{BattleError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::calculator::RatingCalculator;
use crate::rating::storage::RatingStore;
use crate::types::{BattleOutcome, CatalogItem, ItemId, RatingRecord, RatingUpdate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Computes new ratings for an outcome and persists both records
pub struct RatingEngine {
    store: Arc<dyn RatingStore>,
    calculator: Arc<dyn RatingCalculator>,
    metrics: Arc<MetricsCollector>,
}

impl RatingEngine {
    pub fn new(
        store: Arc<dyn RatingStore>,
        calculator: Arc<dyn RatingCalculator>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            calculator,
            metrics,
        }
    }

    /// Apply a decided battle to the user's ratings.
    ///
    /// Both records are written in one batch; on any error neither record changes.
    pub async fn apply_outcome(
        &self,
        user_id: &str,
        outcome: &BattleOutcome,
        cancel: &CancelSignal,
    ) -> Result<RatingUpdate> {
        let timer = self.metrics.start_timer();
        let result = self.apply_outcome_inner(user_id, outcome, cancel).await;

        match &result {
            Ok(update) => {
                self.metrics
                    .record_outcome(true, update.rating_drift(), timer.stop());
            }
            Err(e) => {
                warn!(
                    "Failed to apply outcome - user: '{}', winner: '{}', error: {}",
                    user_id, outcome.winner.title, e
                );
                self.metrics.record_outcome(false, 0, timer.stop());
            }
        }

        result
    }

    async fn apply_outcome_inner(
        &self,
        user_id: &str,
        outcome: &BattleOutcome,
        cancel: &CancelSignal,
    ) -> Result<RatingUpdate> {
        let (winner, loser) = split_outcome(outcome)?;

        debug!(
            "Applying outcome - user: '{}', winner: '{}', loser: '{}'",
            user_id, winner.title, loser.title
        );

        let winner_id = self.internal_id(winner, cancel).await?;
        let loser_id = self.internal_id(loser, cancel).await?;
        if winner_id == loser_id {
            return Err(BattleError::InvalidOutcome {
                reason: format!(
                    "'{}' and '{}' share an internal id",
                    winner.title, loser.title
                ),
            }
            .into());
        }

        let winner_before = self.load_record(user_id, winner_id, &winner.title, cancel).await?;
        let loser_before = self.load_record(user_id, loser_id, &loser.title, cancel).await?;

        let result = self
            .calculator
            .calculate(winner_before.elo_rating, loser_before.elo_rating)?;

        let mut winner_after = winner_before.clone();
        winner_after.title = winner.title.clone();
        winner_after.record_win(result.winner_rating);

        let mut loser_after = loser_before.clone();
        loser_after.title = loser.title.clone();
        loser_after.record_loss(result.loser_rating);

        cancel.check()?;
        self.store
            .put_rating_records(user_id, vec![winner_after.clone(), loser_after.clone()])
            .await
            .map_err(|e| BattleError::PersistenceFailure {
                message: e.to_string(),
            })?;

        info!(
            "Outcome applied - user: '{}', winner: '{}' {} -> {}, loser: '{}' {} -> {}",
            user_id,
            winner.title,
            winner_before.elo_rating,
            winner_after.elo_rating,
            loser.title,
            loser_before.elo_rating,
            loser_after.elo_rating
        );

        Ok(RatingUpdate {
            winner_before,
            winner_after,
            loser_before,
            loser_after,
            winner_expected: result.winner_expected,
            loser_expected: result.loser_expected,
        })
    }

    async fn internal_id(&self, item: &CatalogItem, cancel: &CancelSignal) -> Result<ItemId> {
        if let Some(id) = item.internal_id {
            return Ok(id);
        }

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

    async fn load_record(
        &self,
        user_id: &str,
        item_id: ItemId,
        title: &str,
        cancel: &CancelSignal,
    ) -> Result<RatingRecord> {
        cancel.check()?;
        let record = self.store.get_rating_record(user_id, &item_id).await?;
        Ok(record
            .unwrap_or_else(|| RatingRecord::new(item_id, title, self.calculator.initial_rating())))
    }
}

/// Winner and loser of an outcome, after checking it names two distinct items
fn split_outcome(outcome: &BattleOutcome) -> Result<(&CatalogItem, &CatalogItem)> {
    if outcome.item_a.same_title(&outcome.item_b) {
        return Err(BattleError::InvalidOutcome {
            reason: format!("both items are '{}'", outcome.item_a.title),
        }
        .into());
    }

    if outcome.winner.same_title(&outcome.item_a) {
        Ok((&outcome.item_a, &outcome.item_b))
    } else if outcome.winner.same_title(&outcome.item_b) {
        Ok((&outcome.item_b, &outcome.item_a))
    } else {
        Err(BattleError::InvalidOutcome {
            reason: format!(
                "winner '{}' is neither '{}' nor '{}'",
                outcome.winner.title, outcome.item_a.title, outcome.item_b.title
            ),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::error::battle_error;
    use crate::rating::elo::EloRatingCalculator;
    use crate::rating::storage::MockRatingStore;
    use crate::types::ItemDetails;

    fn item(title: &str) -> CatalogItem {
        CatalogItem::from_details(ItemDetails::bare(title))
    }

    fn outcome(a: &str, b: &str, winner: &str) -> BattleOutcome {
        BattleOutcome {
            item_a: item(a),
            item_b: item(b),
            winner: item(winner),
        }
    }

    fn engine_with(store: Arc<MockRatingStore>) -> RatingEngine {
        RatingEngine::new(
            store,
            Arc::new(EloRatingCalculator::default()),
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_first_battle_between_new_items() {
        let store = Arc::new(MockRatingStore::with_titles(vec!["Alien", "Heat"]));
        let engine = engine_with(store.clone());

        let update = engine
            .apply_outcome("alice", &outcome("Alien", "Heat", "Alien"), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(update.winner_before.elo_rating, 1200);
        assert_eq!(update.winner_after.elo_rating, 1216);
        assert_eq!(update.loser_after.elo_rating, 1184);
        assert_eq!(update.winner_after.title, "Alien");
        assert_eq!(update.winner_after.win_count, 1);
        assert_eq!(update.loser_after.loss_count, 1);
        assert!(update.winner_after.is_consistent());
        assert!(update.loser_after.is_consistent());
        assert_eq!(update.rating_drift(), 0);

        let calls = store.get_put_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.len(), 2);

        let alien = store.find_internal_id("Alien").await.unwrap().unwrap();
        let stored = store.get_rating_record("alice", &alien).await.unwrap().unwrap();
        assert_eq!(stored.elo_rating, 1216);
    }

    #[tokio::test]
    async fn test_item_b_wins() {
        let store = Arc::new(MockRatingStore::with_titles(vec!["Alien", "Heat"]));
        let engine = engine_with(store);

        let update = engine
            .apply_outcome("alice", &outcome("Alien", "Heat", "Heat"), &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(update.winner_after.title, "Heat");
        assert_eq!(update.loser_after.title, "Alien");
    }

    #[tokio::test]
    async fn test_winner_must_be_in_pair() {
        let store = Arc::new(MockRatingStore::with_titles(vec!["Alien", "Heat", "Ran"]));
        let engine = engine_with(store.clone());

        let err = engine
            .apply_outcome("alice", &outcome("Alien", "Heat", "Ran"), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            battle_error(&err),
            Some(BattleError::InvalidOutcome { .. })
        ));

        let err = engine
            .apply_outcome("alice", &outcome("Alien", "Alien", "Alien"), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            battle_error(&err),
            Some(BattleError::InvalidOutcome { .. })
        ));
        assert!(store.get_put_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let store = Arc::new(MockRatingStore::with_titles(vec!["Alien"]));
        let engine = engine_with(store);

        let err = engine
            .apply_outcome("alice", &outcome("Alien", "Heat", "Alien"), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            battle_error(&err),
            Some(BattleError::UnknownItemInStore { title }) if title == "Heat"
        ));
    }

    #[tokio::test]
    async fn test_failed_batch_write_leaves_records_untouched() {
        let store = Arc::new(MockRatingStore::with_titles(vec!["Alien", "Heat"]));
        let engine = engine_with(store.clone());
        store.set_fail_puts(true);

        let err = engine
            .apply_outcome("alice", &outcome("Alien", "Heat", "Alien"), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            battle_error(&err),
            Some(BattleError::PersistenceFailure { .. })
        ));
        assert!(store.inner().user_records("alice").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_known_internal_ids_skip_lookup() {
        let store = Arc::new(MockRatingStore::with_titles(vec!["Alien", "Heat"]));
        let engine = engine_with(store.clone());

        let alien = store.inner().register_item("Alien").unwrap();
        let heat = store.inner().register_item("Heat").unwrap();
        let outcome = BattleOutcome {
            item_a: item("Alien").with_internal_id(alien),
            item_b: item("Heat").with_internal_id(heat),
            winner: item("Heat"),
        };

        engine
            .apply_outcome("alice", &outcome, &CancelSignal::never())
            .await
            .unwrap();
        assert!(store.get_find_calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_outcome_writes_nothing() {
        let store = Arc::new(MockRatingStore::with_titles(vec!["Alien", "Heat"]));
        let engine = engine_with(store.clone());
        let handle = CancelHandle::new();
        handle.cancel();

        let err = engine
            .apply_outcome("alice", &outcome("Alien", "Heat", "Alien"), &handle.signal())
            .await
            .unwrap_err();
        assert!(matches!(battle_error(&err), Some(BattleError::Cancelled)));
        assert!(store.get_put_calls().is_empty());
    }

    #[tokio::test]
    async fn test_ratings_accumulate() {
        let store = Arc::new(MockRatingStore::with_titles(vec!["Alien", "Heat"]));
        let engine = engine_with(store.clone());
        let cancel = CancelSignal::never();

        engine
            .apply_outcome("alice", &outcome("Alien", "Heat", "Alien"), &cancel)
            .await
            .unwrap();
        let second = engine
            .apply_outcome("alice", &outcome("Heat", "Alien", "Alien"), &cancel)
            .await
            .unwrap();

        assert_eq!(second.winner_before.elo_rating, 1216);
        assert_eq!(second.winner_after.match_count, 2);
        assert_eq!(second.winner_after.win_count, 2);
        assert_eq!(second.loser_after.loss_count, 2);
        // bob is unaffected
        let alien = store.find_internal_id("Alien").await.unwrap().unwrap();
        assert!(store.get_rating_record("bob", &alien).await.unwrap().is_none());
    }
}
