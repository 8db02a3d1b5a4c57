//! Versus Engine - matchmaking and ELO rating for pairwise item battles
//!
//! This crate pairs catalog items for head-to-head battles, tracks per-user
//! progress that steers the pairing strategy, resolves candidates against an
//! external metadata provider, and updates per-user ELO ratings.

pub mod battle;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod progress;
pub mod random;
pub mod rating;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{BattleError, Result};
pub use types::*;

// Re-export key components
pub use battle::{BattleService, PairSelector, SelectionStrategy, ServiceComponents};
pub use cancel::{CancelHandle, CancelSignal};
pub use catalog::{CatalogSampler, MetadataProvider, MetadataResolver};
pub use progress::UserProgressTracker;
pub use rating::{RatingEngine, RatingStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
