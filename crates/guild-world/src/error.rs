//! Error types for the `guild-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

/// Errors that can occur while loading or validating world data.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Failed to read a world or market file.
    #[error("failed to read world file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The world or market file is not valid JSON for the expected shape.
    #[error("failed to parse world data: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Two records of the same kind share a symbol.
    #[error("duplicate {kind} symbol: {symbol}")]
    Duplicate {
        /// Record kind ("locale", "route", ...).
        kind: &'static str,
        /// The repeated symbol.
        symbol: String,
    },

    /// A record refers to another record that does not exist.
    #[error("{from} refers to unknown {kind} {target}")]
    DanglingReference {
        /// Kind of the missing record.
        kind: &'static str,
        /// Symbol of the record holding the reference.
        from: String,
        /// The missing symbol.
        target: String,
    },

    /// A resource node cannot be harvested as defined.
    #[error("resource node {symbol} is invalid: {reason}")]
    InvalidResourceNode {
        /// The node symbol.
        symbol: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A market prices an item with an unusable curve.
    #[error("market {market} has invalid pricing for {item}")]
    InvalidPricing {
        /// The market symbol.
        market: String,
        /// The item symbol.
        item: String,
    },
}
