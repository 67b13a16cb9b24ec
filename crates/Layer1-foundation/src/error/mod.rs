//! Error types for Stagehand
//!
//! Every layer shares one error enum so that callers (e.g. an HTTP
//! transport) can map outcomes without downcasting.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Stagehand error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Request validation
    // ========================================================================
    /// Empty or malformed identifier, invalid enum value, empty required
    /// field. Always raised before any mutation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Entity resolution
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The entity exists but the live view of it does not (no container,
    /// no backing session). Distinct from NotFound.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    // ========================================================================
    // Persistence
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Container runtime
    // ========================================================================
    #[error("Container error: {0}")]
    Container(String),

    // ========================================================================
    // External error conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ========================================================================
    // Everything else
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is safe to show to an end user verbatim.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_)
                | Error::NotFound(_)
                | Error::Conflict(_)
                | Error::Unavailable(_)
        )
    }

    /// NotFound helper with an entity kind prefix.
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("{} {}", kind, id))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
