//! Test fixtures and scripted collaborators for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use versus_engine::catalog::{CatalogSampler, InMemoryCatalog, StaticMetadataProvider};
use versus_engine::config::AppConfig;
use versus_engine::error::{BattleError, Result};
use versus_engine::random::{SeededRandom, SharedRandom};
use versus_engine::rating::{MockRatingStore, RatingStore};
use versus_engine::{BattleService, ServiceComponents};

pub const TEST_TITLES: [&str; 12] = [
    "Alien",
    "Heat",
    "Ran",
    "Brazil",
    "Vertigo",
    "Psycho",
    "Rashomon",
    "Stalker",
    "Amadeus",
    "Fargo",
    "Memento",
    "Oldboy",
];

/// Sampler that hands out scripted titles first, then cycles a fallback list
#[derive(Debug)]
pub struct ScriptedSampler {
    script: Mutex<VecDeque<String>>,
    fallback: Vec<String>,
    draws: AtomicU32,
}

impl ScriptedSampler {
    pub fn new(script: &[&str], fallback: &[&str]) -> Self {
        Self {
            script: Mutex::new(script.iter().map(|t| t.to_string()).collect()),
            fallback: fallback.iter().map(|t| t.to_string()).collect(),
            draws: AtomicU32::new(0),
        }
    }

    /// Number of titles handed out (for testing)
    pub fn draw_count(&self) -> u32 {
        self.draws.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSampler for ScriptedSampler {
    async fn sample_title(&self) -> Result<String> {
        let draw = self.draws.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut script) = self.script.lock() {
            if let Some(title) = script.pop_front() {
                return Ok(title);
            }
        }

        if self.fallback.is_empty() {
            return Err(BattleError::CatalogEmpty.into());
        }
        Ok(self.fallback[draw as usize % self.fallback.len()].clone())
    }
}

/// A complete engine over in-memory collaborators
pub struct TestSystem {
    pub service: BattleService,
    pub provider: Arc<StaticMetadataProvider>,
    pub store: Arc<MockRatingStore>,
}

pub fn seeded(seed: u64) -> SharedRandom {
    Arc::new(SeededRandom::new(seed))
}

/// Config with short timeouts suited to tests
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.selection.special_timeout_ms = 200;
    config
}

/// Engine over the standard test catalog, every title known to the store
pub fn create_test_system(config: AppConfig) -> TestSystem {
    let random = seeded(42);
    let sampler = Arc::new(InMemoryCatalog::new(TEST_TITLES, random.clone()));
    create_test_system_with(
        config,
        sampler,
        Arc::new(StaticMetadataProvider::permissive()),
        Arc::new(MockRatingStore::with_titles(TEST_TITLES)),
        random,
    )
}

pub fn create_test_system_with(
    config: AppConfig,
    sampler: Arc<dyn CatalogSampler>,
    provider: Arc<StaticMetadataProvider>,
    store: Arc<MockRatingStore>,
    random: SharedRandom,
) -> TestSystem {
    let service = BattleService::new(
        config,
        ServiceComponents {
            sampler,
            provider: provider.clone(),
            store: store.clone() as Arc<dyn RatingStore>,
            random,
        },
    )
    .expect("test system should build");

    TestSystem {
        service,
        provider,
        store,
    }
}
