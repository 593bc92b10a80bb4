//! Error types for model items and collections.
//!
//! Structural misuse (bad items, bad documents, bad ids) and strict data
//! lookups fail with different types so callers can tell "bad input" from
//! "missing key" without inspecting messages.

use thiserror::Error;

use crate::ports::{ProcessError, RunFailure};
use crate::settings::SettingsError;

/// Structural errors raised by model items and collections.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A value that is not a model item was offered to a collection.
    #[error("Not a model item: {0}")]
    InvalidItem(String),

    /// The item type tag is not one of the known kinds.
    #[error("Unknown item type '{0}'")]
    UnknownItemType(String),

    /// The document is malformed or carries the wrong application marker.
    #[error("Invalid model document: {0}")]
    Document(String),

    /// No item exists under the given id.
    #[error("Item {0} not found")]
    NotFound(u64),

    /// Settings or run options are invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A run failed and the caller asked for failures to be raised.
    #[error("Run failed: {0}")]
    RunFailed(RunFailure),

    /// The process backend raised an error.
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document(msg.into())
    }
}

/// Data lookup errors, raised only for strict lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("Key '{0}' not found")]
    KeyNotFound(String),
}

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;
