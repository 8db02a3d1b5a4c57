//! ELO rating system implementation
//!
//! Classic two-player ELO: each side's expected score is derived from the
//! rating gap, and both ratings move by `K` times the surprise. New ratings
//! are truncated toward zero, so the pair can lose at most one point per battle.

use crate::rating::calculator::{PairwiseRatingResult, RatingCalculator};
use crate::types::DEFAULT_ELO_RATING;
use crate::utils::truncate_rating;
use serde::{Deserialize, Serialize};

/// Configuration for the ELO rating system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    /// Maximum rating change per battle
    pub k_factor: f64,
    /// Rating for items that have never been rated
    pub initial_rating: i32,
    /// Rating gap at which the stronger side is ten times as likely to win
    pub scale: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            initial_rating: DEFAULT_ELO_RATING,
            scale: 400.0,
        }
    }
}

impl EloConfig {
    /// Create conservative configuration (slower rating changes)
    pub fn conservative() -> Self {
        Self {
            k_factor: 16.0,
            ..Self::default()
        }
    }

    /// Create aggressive configuration (faster rating changes)
    pub fn aggressive() -> Self {
        Self {
            k_factor: 48.0,
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.k_factor.is_finite() || self.k_factor <= 0.0 {
            return Err(crate::error::BattleError::ConfigurationError {
                message: "K factor must be positive".to_string(),
            }
            .into());
        }

        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(crate::error::BattleError::ConfigurationError {
                message: "Rating scale must be positive".to_string(),
            }
            .into());
        }

        if self.initial_rating <= 0 {
            return Err(crate::error::BattleError::ConfigurationError {
                message: "Initial rating must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// ELO rating calculator
#[derive(Debug, Clone)]
pub struct EloRatingCalculator {
    config: EloConfig,
}

impl EloRatingCalculator {
    /// Create a calculator, rejecting invalid configuration
    pub fn new(config: EloConfig) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn get_config(&self) -> &EloConfig {
        &self.config
    }

    /// Expected score of a side rated `rating` against `opponent`
    pub fn expected_score(&self, rating: i32, opponent: i32) -> f64 {
        let exponent = (opponent - rating) as f64 / self.config.scale;
        1.0 / (1.0 + 10f64.powf(exponent))
    }
}

impl Default for EloRatingCalculator {
    fn default() -> Self {
        Self {
            config: EloConfig::default(),
        }
    }
}

impl RatingCalculator for EloRatingCalculator {
    fn calculate(
        &self,
        winner_rating: i32,
        loser_rating: i32,
    ) -> crate::error::Result<PairwiseRatingResult> {
        let winner_expected = self.expected_score(winner_rating, loser_rating);
        let loser_expected = self.expected_score(loser_rating, winner_rating);

        let k = self.config.k_factor;
        let winner_new = winner_rating as f64 + k * (1.0 - winner_expected);
        let loser_new = loser_rating as f64 + k * (0.0 - loser_expected);

        Ok(PairwiseRatingResult {
            winner_rating: truncate_rating(winner_new),
            loser_rating: truncate_rating(loser_new),
            winner_expected,
            loser_expected,
        })
    }

    fn initial_rating(&self) -> i32 {
        self.config.initial_rating
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "elo",
            "k_factor": self.config.k_factor,
            "initial_rating": self.config.initial_rating,
            "scale": self.config.scale
        })
    }

    fn update_config(&mut self, config: serde_json::Value) -> crate::error::Result<()> {
        let mut updated = self.config.clone();

        if let Some(k) = config.get("k_factor").and_then(|v| v.as_f64()) {
            updated.k_factor = k;
        }
        if let Some(initial) = config.get("initial_rating").and_then(|v| v.as_i64()) {
            updated.initial_rating = i32::try_from(initial).map_err(|_| {
                crate::error::BattleError::ConfigurationError {
                    message: format!("Initial rating out of range: {}", initial),
                }
            })?;
        }
        if let Some(scale) = config.get("scale").and_then(|v| v.as_f64()) {
            updated.scale = scale;
        }

        updated.validate()?;
        self.config = updated;
        Ok(())
    }
}
