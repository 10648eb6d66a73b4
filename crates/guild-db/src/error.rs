//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`fred`] and [`serde_json`] errors with context about which key or path
//! the operation addressed.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A non-root write addressed a path whose parent does not exist.
    #[error("Path {path} not found under key {key}")]
    PathNotFound {
        /// The document key.
        key: String,
        /// The path that could not be resolved.
        path: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
