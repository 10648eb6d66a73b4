//! Static world data for the Guild Golems simulation core.
//!
//! The world is a handful of locales joined by one-way routes. Locales
//! list the resource nodes that can be harvested there and the markets
//! reachable from there. Nothing in this crate changes at runtime.
//!
//! # Modules
//!
//! - [`catalog`] -- The [`WorldCatalog`] lookup trait and the validated
//!   [`StaticWorld`] implementation, loadable from JSON.
//! - [`error`] -- Error types for loading and validation.
//! - [`starting_world`] -- Built-in three-locale world and its markets.

pub mod catalog;
pub mod error;
pub mod starting_world;

pub use catalog::{StaticWorld, WorldCatalog, WorldDefinition, markets_from_file, markets_from_json_str};
pub use error::WorldError;
pub use starting_world::{STARTING_LOCALE, STARTING_MARKET, starting_markets, starting_world};
