//! User progress tracking
//!
//! The progress counter drives which pairing strategy a user sees next.

pub mod tracker;

pub use tracker::{next_count, ProgressSession, UserProgress, UserProgressTracker, MAX_BATTLE_COUNT};
