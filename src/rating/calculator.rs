//! Rating calculator trait
//!
//! This module defines the interface for pairwise rating calculations.

use serde::{Deserialize, Serialize};

/// New ratings produced for one decided battle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairwiseRatingResult {
    pub winner_rating: i32,
    pub loser_rating: i32,
    /// Expected score of the winner before the battle
    pub winner_expected: f64,
    /// Expected score of the loser before the battle
    pub loser_expected: f64,
}

/// Trait for calculating rating changes after a battle
pub trait RatingCalculator: Send + Sync {
    /// Calculate new ratings for a winner and a loser
    ///
    /// # Arguments
    /// * `winner_rating` - Current rating of the winning item
    /// * `loser_rating` - Current rating of the losing item
    fn calculate(
        &self,
        winner_rating: i32,
        loser_rating: i32,
    ) -> crate::error::Result<PairwiseRatingResult>;

    /// Rating assigned to an item that has never been rated
    fn initial_rating(&self) -> i32;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;

    /// Update configuration from JSON
    fn update_config(&mut self, config: serde_json::Value) -> crate::error::Result<()>;
}
