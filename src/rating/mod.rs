//! Rating system using pairwise ELO
//!
//! This module provides rating calculations, storage interfaces, and the
//! engine that applies battle outcomes to a user's records.

pub mod calculator;
pub mod elo;
pub mod engine;
pub mod storage;

// Re-export commonly used types
pub use calculator::{PairwiseRatingResult, RatingCalculator};
pub use elo::{EloConfig, EloRatingCalculator};
pub use engine::RatingEngine;
pub use storage::{InMemoryRatingStore, MockRatingStore, RatingStore};
