//! Common types used throughout the battle engine

use crate::battle::strategy::SelectionStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = String;

/// Stable internal identifier for catalog items
pub type ItemId = Uuid;

/// Default ELO rating for an item that has never been rated
pub const DEFAULT_ELO_RATING: i32 = 1200;

/// Metric used to rank a user's rating records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankingMetric {
    MatchCount,
    WinCount,
    EloRating,
}

impl RankingMetric {
    /// Value of this metric for a record (higher ranks first)
    pub fn value_of(&self, record: &RatingRecord) -> i64 {
        match self {
            RankingMetric::MatchCount => record.match_count as i64,
            RankingMetric::WinCount => record.win_count as i64,
            RankingMetric::EloRating => record.elo_rating as i64,
        }
    }
}

impl std::fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankingMetric::MatchCount => write!(f, "match_count"),
            RankingMetric::WinCount => write!(f, "win_count"),
            RankingMetric::EloRating => write!(f, "elo_rating"),
        }
    }
}

/// Display metadata returned by the metadata provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    pub year: Option<i32>,
    pub plot: String,
    pub director: String,
    pub poster_url: String,
    pub genre: String,
    pub actors: String,
    pub provider_rating: String,
}

/// Item details as returned by the metadata provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub title: String,
    pub external_id: String,
    pub metadata: DisplayMetadata,
}

impl ItemDetails {
    /// Details carrying only a title, for providers without richer data
    pub fn bare(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            external_id: title.to_lowercase().replace(' ', "-"),
            title,
            metadata: DisplayMetadata::default(),
        }
    }
}

/// A catalog item shown in a battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub title: String,
    pub external_id: String,
    /// Set once the item has been cross-referenced against the rating store
    pub internal_id: Option<ItemId>,
    pub metadata: DisplayMetadata,
}

impl CatalogItem {
    /// Build an unresolved catalog item from provider details
    pub fn from_details(details: ItemDetails) -> Self {
        Self {
            title: details.title,
            external_id: details.external_id,
            internal_id: None,
            metadata: details.metadata,
        }
    }

    /// Attach the internal identifier from the rating store
    pub fn with_internal_id(mut self, internal_id: ItemId) -> Self {
        self.internal_id = Some(internal_id);
        self
    }

    /// Whether two items are the same catalog entry (compared by title)
    pub fn same_title(&self, other: &CatalogItem) -> bool {
        self.title == other.title
    }
}

/// A user's personal rating record for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub item_id: ItemId,
    /// Denormalized for quick listing
    pub title: String,
    pub elo_rating: i32,
    pub match_count: u32,
    pub win_count: u32,
    pub loss_count: u32,
    pub last_updated: DateTime<Utc>,
}

impl RatingRecord {
    /// Default record for an item the user has never rated
    pub fn new(item_id: ItemId, title: impl Into<String>, initial_rating: i32) -> Self {
        Self {
            item_id,
            title: title.into(),
            elo_rating: initial_rating,
            match_count: 0,
            win_count: 0,
            loss_count: 0,
            last_updated: Utc::now(),
        }
    }

    /// Record a win with the new rating
    pub fn record_win(&mut self, new_rating: i32) {
        self.elo_rating = new_rating;
        self.match_count += 1;
        self.win_count += 1;
        self.last_updated = Utc::now();
    }

    /// Record a loss with the new rating
    pub fn record_loss(&mut self, new_rating: i32) {
        self.elo_rating = new_rating;
        self.match_count += 1;
        self.loss_count += 1;
        self.last_updated = Utc::now();
    }

    /// match_count == win_count + loss_count
    pub fn is_consistent(&self) -> bool {
        self.match_count == self.win_count + self.loss_count
    }
}

/// Two distinct items selected for a battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlePair {
    pub item_a: CatalogItem,
    pub item_b: CatalogItem,
    /// Progress count the pair was selected at
    pub battle_count: u8,
    /// Strategy chosen for this count
    pub strategy: SelectionStrategy,
    /// True when a special strategy degraded to a plain random draw
    pub fell_back: bool,
}

/// Outcome of a battle submitted by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub item_a: CatalogItem,
    pub item_b: CatalogItem,
    pub winner: CatalogItem,
}

impl BattleOutcome {
    /// Outcome where `winner` is one of the two items of `pair`
    pub fn for_pair(pair: &BattlePair, item_a_wins: bool) -> Self {
        let winner = if item_a_wins {
            pair.item_a.clone()
        } else {
            pair.item_b.clone()
        };
        Self {
            item_a: pair.item_a.clone(),
            item_b: pair.item_b.clone(),
            winner,
        }
    }
}

/// Rating change produced by applying one outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub winner_before: RatingRecord,
    pub winner_after: RatingRecord,
    pub loser_before: RatingRecord,
    pub loser_after: RatingRecord,
    pub winner_expected: f64,
    pub loser_expected: f64,
}

impl RatingUpdate {
    /// Net rating change across both records (drift from zero-sum after truncation)
    pub fn rating_drift(&self) -> i32 {
        (self.winner_after.elo_rating - self.winner_before.elo_rating)
            + (self.loser_after.elo_rating - self.loser_before.elo_rating)
    }
}
