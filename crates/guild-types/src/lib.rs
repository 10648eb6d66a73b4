//! Shared type definitions for the Guild Golems simulation core.
//!
//! Every crate in the workspace speaks in these types. Nothing here
//! performs I/O or reads the clock except [`ids`] minting fresh ids.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for order identifiers
//! - [`enums`] -- Archetypes, golem statuses and order lifecycle
//! - [`structs`] -- Golems, inventories, users, orders and markets
//! - [`world`] -- Static world records (locales, routes, nodes, items)

pub mod enums;
pub mod ids;
pub mod structs;
pub mod world;

pub use enums::{Archetype, GolemStatus, OrderStatus, OrderType, ParseEnumError};
pub use ids::{DeadLetterId, OrderId};
pub use structs::{Golem, Inventory, ManaDetails, Market, MarketOrder, Order, PricingInfo, User};
pub use world::{DropEntry, ItemDef, Locale, ResourceNode, Route};
