//! Utility functions for the battle engine

use crate::types::ItemId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique item ID
pub fn generate_item_id() -> ItemId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Truncate a floating point rating toward zero
pub fn truncate_rating(rating: f64) -> i32 {
    rating.trunc() as i32
}
