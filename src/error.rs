//! Error types for the battle engine
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Domain failures are modelled as [`BattleError`]
//! variants so callers can react to them with `downcast_ref`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking and rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum BattleError {
    #[error("Catalog is empty")]
    CatalogEmpty,

    #[error("Metadata lookup for '{title}' failed after {attempts} attempts")]
    TransientResolutionFailure { title: String, attempts: u32 },

    #[error("Metadata not found for '{title}'")]
    MetadataNotFound { title: String },

    #[error("Could not resolve an item for slot {slot} after {redraws} redraws")]
    ResolutionExhausted { slot: char, redraws: u32 },

    #[error("Special selection timed out after {timeout_ms}ms")]
    SelectionTimeout { timeout_ms: u64 },

    #[error("Item not found in rating store: {title}")]
    UnknownItemInStore { title: String },

    #[error("Pairing unavailable after {attempts} attempts")]
    PairingUnavailable { attempts: u32 },

    #[error("Persistence failed: {message}")]
    PersistenceFailure { message: String },

    #[error("Invalid battle outcome: {reason}")]
    InvalidOutcome { reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl BattleError {
    /// Whether the selector should answer this error by drawing a new title
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            BattleError::TransientResolutionFailure { .. } | BattleError::MetadataNotFound { .. }
        )
    }
}

/// Look for a [`BattleError`] inside an anyhow error
pub fn battle_error(err: &anyhow::Error) -> Option<&BattleError> {
    err.downcast_ref::<BattleError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_failure_classification() {
        assert!(BattleError::MetadataNotFound {
            title: "Heat".to_string()
        }
        .is_resolution_failure());
        assert!(BattleError::TransientResolutionFailure {
            title: "Heat".to_string(),
            attempts: 3
        }
        .is_resolution_failure());
        assert!(!BattleError::CatalogEmpty.is_resolution_failure());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = BattleError::PairingUnavailable { attempts: 4 }.into();
        assert!(matches!(
            battle_error(&err),
            Some(BattleError::PairingUnavailable { attempts: 4 })
        ));
        assert_eq!(err.to_string(), "Pairing unavailable after 4 attempts");
    }
}
