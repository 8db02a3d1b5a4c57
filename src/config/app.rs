//! Main application configuration
//!
//! This module defines the configuration structures for the battle engine,
//! including environment variable loading, TOML files and validation.

use crate::battle::selector::SelectorConfig;
use crate::catalog::omdb::DEFAULT_OMDB_BASE_URL;
use crate::rating::elo::EloConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub selection: SelectionSettings,
    pub resolver: ResolverSettings,
    pub rating: RatingSettings,
    pub progress: ProgressSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Pair selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    /// Budget for the special-strategy sub-task in milliseconds
    pub special_timeout_ms: u64,
    /// Restarts allowed when a resolved item is missing from the store
    pub max_restarts: u32,
}

/// Metadata resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Provider calls per title, also the redraw budget per slot
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// OMDb API key; the static provider is used when absent
    pub omdb_api_key: Option<String>,
    pub omdb_base_url: String,
}

/// ELO settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    pub k_factor: f64,
    pub initial_rating: i32,
    pub scale: f64,
}

/// Progress tracker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Records idle longer than this are pruned
    pub idle_ttl_seconds: u64,
    /// How often the prune task runs
    pub prune_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "versus-engine".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            special_timeout_ms: 5000,
            max_restarts: 3,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 0,
            omdb_api_key: None,
            omdb_base_url: DEFAULT_OMDB_BASE_URL.to_string(),
        }
    }
}

impl Default for RatingSettings {
    fn default() -> Self {
        let elo = EloConfig::default();
        Self {
            k_factor: elo.k_factor,
            initial_rating: elo.initial_rating,
            scale: elo.scale,
        }
    }
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            idle_ttl_seconds: 86_400,     // 24 hours
            prune_interval_seconds: 3600, // 1 hour
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }

        // Selection settings
        if let Ok(timeout) = env::var("SPECIAL_SELECTION_TIMEOUT_MS") {
            config.selection.special_timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SPECIAL_SELECTION_TIMEOUT_MS value: {}", timeout))?;
        }
        if let Ok(restarts) = env::var("MAX_SELECTION_RESTARTS") {
            config.selection.max_restarts = restarts
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_SELECTION_RESTARTS value: {}", restarts))?;
        }

        // Resolver settings
        if let Ok(attempts) = env::var("RESOLVER_MAX_ATTEMPTS") {
            config.resolver.max_attempts = attempts
                .parse()
                .map_err(|_| anyhow!("Invalid RESOLVER_MAX_ATTEMPTS value: {}", attempts))?;
        }
        if let Ok(delay) = env::var("RESOLVER_RETRY_DELAY_MS") {
            config.resolver.retry_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid RESOLVER_RETRY_DELAY_MS value: {}", delay))?;
        }
        if let Ok(key) = env::var("OMDB_API_KEY") {
            if !key.trim().is_empty() {
                config.resolver.omdb_api_key = Some(key);
            }
        }
        if let Ok(url) = env::var("OMDB_BASE_URL") {
            config.resolver.omdb_base_url = url;
        }

        // Rating settings
        if let Ok(k) = env::var("ELO_K_FACTOR") {
            config.rating.k_factor = k
                .parse()
                .map_err(|_| anyhow!("Invalid ELO_K_FACTOR value: {}", k))?;
        }
        if let Ok(initial) = env::var("ELO_INITIAL_RATING") {
            config.rating.initial_rating = initial
                .parse()
                .map_err(|_| anyhow!("Invalid ELO_INITIAL_RATING value: {}", initial))?;
        }

        // Progress settings
        if let Ok(ttl) = env::var("PROGRESS_IDLE_TTL_SECONDS") {
            config.progress.idle_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid PROGRESS_IDLE_TTL_SECONDS value: {}", ttl))?;
        }
        if let Ok(interval) = env::var("PROGRESS_PRUNE_INTERVAL_SECONDS") {
            config.progress.prune_interval_seconds = interval.parse().map_err(|_| {
                anyhow!("Invalid PROGRESS_PRUNE_INTERVAL_SECONDS value: {}", interval)
            })?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get the special-selection timeout as Duration
    pub fn special_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.selection.special_timeout_ms)
    }

    /// Get the resolver retry delay as Duration
    pub fn resolver_retry_delay(&self) -> Duration {
        Duration::from_millis(self.resolver.retry_delay_ms)
    }

    /// Get the progress idle TTL as Duration
    pub fn progress_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.progress.idle_ttl_seconds)
    }

    /// Get the prune interval as Duration
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.progress.prune_interval_seconds)
    }

    pub fn elo_config(&self) -> EloConfig {
        EloConfig {
            k_factor: self.rating.k_factor,
            initial_rating: self.rating.initial_rating,
            scale: self.rating.scale,
        }
    }

    /// Selector tuning; the per-slot redraw budget follows the resolver budget
    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            special_timeout: self.special_selection_timeout(),
            max_restarts: self.selection.max_restarts,
            max_redraws: self.resolver.max_attempts,
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }

    // Validate selection settings
    if config.selection.special_timeout_ms == 0 {
        return Err(anyhow!("Special selection timeout must be greater than 0"));
    }

    // Validate resolver settings
    if config.resolver.max_attempts == 0 {
        return Err(anyhow!("Resolver max attempts must be greater than 0"));
    }
    if config.resolver.omdb_base_url.is_empty() {
        return Err(anyhow!("OMDb base URL cannot be empty"));
    }

    // Validate rating settings
    config.elo_config().validate()?;

    // Validate progress settings
    if config.progress.idle_ttl_seconds == 0 {
        return Err(anyhow!("Progress idle TTL must be greater than 0"));
    }
    if config.progress.prune_interval_seconds == 0 {
        return Err(anyhow!("Prune interval must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.special_selection_timeout(), Duration::from_secs(5));
        assert_eq!(config.selector_config().max_redraws, 3);
        assert_eq!(config.elo_config(), EloConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.selection.special_timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.resolver.max_attempts = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.rating.k_factor = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [selection]
            special_timeout_ms = 250

            [rating]
            k_factor = 24.0
            "#,
        )
        .unwrap();

        assert_eq!(config.special_selection_timeout(), Duration::from_millis(250));
        assert_eq!(config.selection.max_restarts, 3);
        assert_eq!(config.rating.k_factor, 24.0);
        assert_eq!(config.rating.initial_rating, 1200);
        assert_eq!(config.service.name, "versus-engine");
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(AppConfig::from_toml_str("[resolver]\nmax_attempts = 0\n").is_err());
        assert!(AppConfig::from_toml_str("not toml at all [").is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("versus-engine-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[service]\nlog_level = \"debug\"\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.service.log_level, "debug");

        std::fs::remove_file(&path).unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }
}
