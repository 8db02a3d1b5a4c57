//! Pairing strategies keyed on the user's progress count

use crate::types::RankingMetric;
use serde::{Deserialize, Serialize};

/// Which slot a special strategy fills from the user's top list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialSlots {
    /// Slot A from the top list, slot B plain draw
    ItemA,
    /// Slot A plain draw, slot B from the top list
    ItemB,
    /// Both slots drawn independently from the top list
    Both,
}

/// Strategy used to pick a battle pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// Both items drawn at random from the catalog
    Default,
    /// Item A from the user's ten most battled items
    TopByMatches,
    /// Item B from the user's ten most winning items
    TopByWins,
    /// Both items from the user's twenty highest rated items
    TopByElo,
}

impl SelectionStrategy {
    /// Strategy for a post-increment progress count
    pub fn for_count(count: u8) -> Self {
        match count {
            3 => SelectionStrategy::TopByMatches,
            5 => SelectionStrategy::TopByWins,
            10 => SelectionStrategy::TopByElo,
            _ => SelectionStrategy::Default,
        }
    }

    pub fn is_special(&self) -> bool {
        !matches!(self, SelectionStrategy::Default)
    }

    /// Metric and list size for the top-N lookup
    pub fn ranking(&self) -> Option<(RankingMetric, usize)> {
        match self {
            SelectionStrategy::Default => None,
            SelectionStrategy::TopByMatches => Some((RankingMetric::MatchCount, 10)),
            SelectionStrategy::TopByWins => Some((RankingMetric::WinCount, 10)),
            SelectionStrategy::TopByElo => Some((RankingMetric::EloRating, 20)),
        }
    }

    pub fn special_slots(&self) -> Option<SpecialSlots> {
        match self {
            SelectionStrategy::Default => None,
            SelectionStrategy::TopByMatches => Some(SpecialSlots::ItemA),
            SelectionStrategy::TopByWins => Some(SpecialSlots::ItemB),
            SelectionStrategy::TopByElo => Some(SpecialSlots::Both),
        }
    }

    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::Default => "default",
            SelectionStrategy::TopByMatches => "top_by_matches",
            SelectionStrategy::TopByWins => "top_by_wins",
            SelectionStrategy::TopByElo => "top_by_elo",
        }
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
