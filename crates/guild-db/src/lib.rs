//! Data layer for the Guild Golems simulation core.
//!
//! All state lives in a keyed JSON document store. User records and the
//! shared market table are each one document; updates are targeted writes
//! to sub-paths of those documents.
//!
//! ```text
//! GameService / ClearinghouseWorker
//!     |
//!     +-- UserRepository   ("user:{username}")
//!     +-- MarketRepository ("markets")
//!             |
//!             +-- DocumentStore
//!                   |-- MemoryStore     (in-process)
//!                   +-- DragonflyStore  (RedisJSON)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`DocumentStore`] trait and path resolution helpers
//! - [`path`] -- [`DocPath`] and its legacy `RedisJSON` rendering
//! - [`memory`] -- In-process backend
//! - [`dragonfly`] -- `Dragonfly` backend over `fred`
//! - [`user_store`] -- User records and snapshot diffing
//! - [`market_store`] -- Market records
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod market_store;
pub mod memory;
pub mod path;
pub mod store;
pub mod user_store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyStore;
pub use error::DbError;
pub use market_store::{MARKETS_KEY, MarketRepository};
pub use memory::MemoryStore;
pub use path::DocPath;
pub use store::DocumentStore;
pub use user_store::{UserRepository, UserWrite, changed_paths, user_key};
