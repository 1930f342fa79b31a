//! Error types for the factctx domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Storage has its own bounded-context error; the top-level [`Error`]
//! wraps it alongside configuration failures.

use crate::fact::Scope;
use thiserror::Error;

/// The top-level error type for all factctx operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error means the storage backend could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable(_)))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised by [`FactStore`](crate::store::FactStore) implementations.
///
/// Stores surface these directly; they are never retried or hidden.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Duplicate key: a fact '{key}' already exists in scope {scope}")]
    DuplicateKey { scope: Scope, key: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Invalid fact: {0}")]
    InvalidFact(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_displays_scope_and_key() {
        let err = Error::Store(StoreError::DuplicateKey {
            scope: Scope::Project,
            key: "db_engine".into(),
        });
        let text = err.to_string();
        assert!(text.contains("project"));
        assert!(text.contains("db_engine"));
    }

    #[test]
    fn unavailable_is_detected_through_wrapper() {
        let err: Error = StoreError::Unavailable("disk gone".into()).into();
        assert!(err.is_unavailable());
        assert!(!Error::config("max_facts must be > 0").is_unavailable());
    }

    #[test]
    fn config_error_displays_message() {
        let err = Error::config("unknown scope 'team'");
        assert_eq!(err.to_string(), "Configuration error: unknown scope 'team'");
    }
}
