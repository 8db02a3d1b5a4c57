//! Per-user battle progress tracking
//!
//! Each user owns a counter in `1..=10` that selects the pairing strategy.
//! Entries live in a sharded map with one async mutex per user, so calls for the
//! same user serialize while different users never contend on a global lock.

use crate::types::UserId;
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Highest value of the progress counter before it wraps
pub const MAX_BATTLE_COUNT: u8 = 10;

/// Progress record for a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: UserId,
    /// 0 for a fresh or reset user, otherwise in `1..=10`
    pub battle_count: u8,
    pub last_updated: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            battle_count: 0,
            last_updated: current_timestamp(),
        }
    }

    /// Advance the counter, wrapping 10 back to 1
    pub fn increment(&mut self) -> u8 {
        self.battle_count = next_count(self.battle_count);
        self.last_updated = current_timestamp();
        self.battle_count
    }

    pub fn reset(&mut self) {
        self.battle_count = 0;
        self.last_updated = current_timestamp();
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_updated).to_std().unwrap_or_default()
    }
}

/// Counter value following `count`
pub fn next_count(count: u8) -> u8 {
    let next = count.saturating_add(1);
    if next > MAX_BATTLE_COUNT {
        1
    } else {
        next
    }
}

/// Exclusive access to one user's progress for the lifetime of the guard
#[derive(Debug)]
pub struct ProgressSession {
    guard: OwnedMutexGuard<UserProgress>,
}

impl ProgressSession {
    pub fn user_id(&self) -> &str {
        &self.guard.user_id
    }

    pub fn increment(&mut self) -> u8 {
        self.guard.increment()
    }

    pub fn reset(&mut self) {
        self.guard.reset();
    }
}

/// Concurrency-safe registry of per-user progress
#[derive(Debug, Default)]
pub struct UserProgressTracker {
    entries: DashMap<UserId, Arc<Mutex<UserProgress>>>,
}

impl UserProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a user's progress, creating the record on first use
    pub async fn session(&self, user_id: &str) -> ProgressSession {
        // Clone the entry out so no shard lock is held across the await
        let entry = self
            .entries
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(UserProgress::new(user_id.to_string()))))
            .clone();

        ProgressSession {
            guard: entry.lock_owned().await,
        }
    }

    /// Increment a user's counter and return the new value
    pub async fn increment(&self, user_id: &str) -> u8 {
        let mut session = self.session(user_id).await;
        let count = session.increment();
        debug!("Progress incremented - user: '{}', count: {}", user_id, count);
        count
    }

    /// Reset a user's counter to 0
    pub async fn reset(&self, user_id: &str) {
        let mut session = self.session(user_id).await;
        session.reset();
        debug!("Progress reset - user: '{}'", user_id);
    }

    /// Current progress for a user, if one has been recorded
    pub async fn get(&self, user_id: &str) -> Option<UserProgress> {
        let entry = self.entries.get(user_id).map(|e| e.value().clone())?;
        let progress = entry.lock().await;
        Some(progress.clone())
    }

    pub fn user_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop records idle for longer than `max_idle`. Locked or contended entries are kept.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = current_timestamp();
        let before = self.entries.len();

        self.entries.retain(|_, entry| {
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            match entry.try_lock() {
                Ok(progress) => progress.idle_for(now) <= max_idle,
                Err(_) => true,
            }
        });

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            info!("Pruned {} idle progress records", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use proptest::prelude::*;

    #[test]
    fn test_next_count_wraps() {
        assert_eq!(next_count(0), 1);
        assert_eq!(next_count(9), 10);
        assert_eq!(next_count(10), 1);
    }

    #[tokio::test]
    async fn test_fresh_user_cycle() {
        let tracker = UserProgressTracker::new();
        let mut counts = Vec::new();
        for _ in 0..11 {
            counts.push(tracker.increment("alice").await);
        }
        assert_eq!(counts, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 1]);
    }

    #[tokio::test]
    async fn test_reset_restarts_at_one() {
        let tracker = UserProgressTracker::new();
        tracker.increment("alice").await;
        tracker.increment("alice").await;
        tracker.reset("alice").await;

        assert_eq!(tracker.get("alice").await.map(|p| p.battle_count), Some(0));
        assert_eq!(tracker.increment("alice").await, 1);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let tracker = UserProgressTracker::new();
        tracker.increment("alice").await;
        tracker.increment("alice").await;
        assert_eq!(tracker.increment("bob").await, 1);
        assert_eq!(tracker.increment("alice").await, 3);
        assert!(tracker.get("carol").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let tracker = Arc::new(UserProgressTracker::new());
        let tasks = (0..9).map(|_| {
            let tracker = tracker.clone();
            async move { tracker.increment("alice").await }
        });

        let mut counts = join_all(tasks).await;
        counts.sort_unstable();
        assert_eq!(counts, (1..=9).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn test_prune_idle_keeps_recent_and_locked() {
        let tracker = UserProgressTracker::new();
        tracker.increment("alice").await;
        tracker.increment("bob").await;

        assert_eq!(tracker.prune_idle(Duration::from_secs(60)), 0);
        assert_eq!(tracker.user_count(), 2);

        let held = tracker.session("bob").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(tracker.prune_idle(Duration::from_millis(1)), 1);
        assert!(tracker.get("alice").await.is_none());
        assert_eq!(held.user_id(), "bob");
        drop(held);
        assert_eq!(tracker.user_count(), 1);
    }

    proptest! {
        #[test]
        fn prop_counter_cycles_through_one_to_ten(increments in 1usize..200) {
            let mut progress = UserProgress::new("alice".to_string());
            for _ in 0..increments {
                let count = progress.increment();
                prop_assert!((1..=MAX_BATTLE_COUNT).contains(&count));
            }
            prop_assert_eq!(progress.battle_count as usize, (increments - 1) % 10 + 1);
        }
    }
}
