//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the process during
//! startup or shutdown.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: guild_core::ConfigError,
    },

    /// World or market data failed to load or validate.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: guild_world::WorldError,
    },

    /// The store could not be reached or seeded.
    #[error("store error: {source}")]
    Db {
        /// The underlying store error.
        #[from]
        source: guild_db::DbError,
    },

    /// The clearinghouse failed to shut down cleanly.
    #[error("game error: {source}")]
    Game {
        /// The underlying game error.
        #[from]
        source: guild_core::GameError,
    },

    /// Installing the shutdown signal handler failed.
    #[error("signal error: {message}")]
    Signal {
        /// Description of the signal failure.
        message: String,
    },
}
