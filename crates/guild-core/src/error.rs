//! The error taxonomy surfaced by game operations.
//!
//! Every [`GameError`] carries a stable [`ErrorCode`] (name and number) for
//! clients and a human-readable detail through its `Display` impl. Errors
//! are grouped into [`ErrorKind`] categories; contention errors are the only
//! ones worth retrying unchanged.

use core::fmt;

use guild_db::DbError;
use guild_types::{Archetype, GolemStatus};

use crate::inventory::InventoryError;
use crate::pricing::PricingError;
use crate::tick::TickError;

/// Broad category of a [`GameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request is malformed or not permitted in the current state.
    Validation,
    /// The request asks for more than the user has.
    Resource,
    /// The request collided with another in-flight request.
    Contention,
    /// An order could not be settled.
    Settlement,
    /// Storage or an internal invariant failed.
    Internal,
}

/// Stable machine-readable identifier for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Variant name, e.g. `GolemBusy`.
    pub name: &'static str,
    /// Numeric code, stable across releases.
    pub number: u16,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.number)
    }
}

/// Errors returned by game operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The requested status is not a known status name.
    #[error("status not recognized: {status}")]
    StatusNotRecognized {
        /// The rejected status string.
        status: String,
    },

    /// The golem is running a blocking task.
    #[error("golem {golem} is busy ({status})")]
    GolemBusy {
        /// The golem symbol.
        golem: String,
        /// Its current blocking status.
        status: GolemStatus,
    },

    /// The archetype may not enter the requested status.
    #[error("status {status} not allowed for archetype {archetype}")]
    StatusNotAllowedForArchetype {
        /// The requested status.
        status: GolemStatus,
        /// The golem's archetype.
        archetype: Archetype,
    },

    /// Another request is already editing this golem.
    #[error("golem {golem} of {username} is locked for editing")]
    GolemLockedForEditing {
        /// The owning user.
        username: String,
        /// The golem symbol.
        golem: String,
    },

    /// The source inventory does not hold enough of an item.
    #[error("insufficient {item}: have {held}, requested {requested}")]
    InsufficientResourcesHeld {
        /// The item symbol.
        item: String,
        /// Quantity held.
        held: u64,
        /// Quantity requested.
        requested: u64,
    },

    /// The manifest would exceed the golem's carrying capacity.
    #[error("manifest overflow: load {load} exceeds capacity {capacity}")]
    ManifestOverflow {
        /// Load after packing.
        load: u64,
        /// The golem's capacity.
        capacity: u64,
    },

    /// The golem's locale has no departing routes.
    #[error("no available routes from {locale}")]
    NoAvailableRoutes {
        /// The locale symbol.
        locale: String,
    },

    /// The requested route does not depart from the golem's locale.
    #[error("route {route} is not available from {locale}")]
    TargetRouteUnavailable {
        /// The requested route.
        route: String,
        /// The locale symbol.
        locale: String,
    },

    /// The user does not have enough mana.
    #[error("insufficient mana: have {have} but requires {requires}")]
    InsufficientMana {
        /// Mana held.
        have: f64,
        /// Mana required.
        requires: f64,
    },

    /// The request payload is malformed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No user with this name exists.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// A user with this name already exists.
    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    /// The user has no golem with this symbol.
    #[error("golem {golem} not found for {username}")]
    GolemNotFound {
        /// The owning user.
        username: String,
        /// The golem symbol.
        golem: String,
    },

    /// The user has not learned this ritual.
    #[error("ritual not known: {0}")]
    RitualNotKnown(String),

    /// No ritual with this name is configured.
    #[error("no such ritual: {0}")]
    NoSuchRitual(String),

    /// The resource node is not in the golem's locale.
    #[error("resource node {node} is not available in {locale}")]
    ResourceNodeUnavailable {
        /// The requested node.
        node: String,
        /// The locale symbol.
        locale: String,
    },

    /// The market is not reachable from the golem's locale, or does not
    /// exist.
    #[error("market {market} is not available from {locale}")]
    MarketUnavailable {
        /// The requested market.
        market: String,
        /// The locale symbol.
        locale: String,
    },

    /// The market does not price this item.
    #[error("item {item} is not traded on {market}")]
    ItemNotTraded {
        /// The item symbol.
        item: String,
        /// The market symbol.
        market: String,
    },

    /// The item is not in the world catalog.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// No order with this reference exists.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// An order failed to settle.
    #[error("settlement of {reference} failed: {reason}")]
    SettlementFailed {
        /// The order reference.
        reference: String,
        /// What went wrong.
        reason: String,
    },

    /// World data referenced by persisted state is missing.
    #[error("world data error: {0}")]
    WorldData(String),

    /// The document store failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// A market carries an unusable price curve.
    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// Lazy recomputation failed.
    #[error("recompute error: {0}")]
    Tick(#[from] TickError),

    /// A checked arithmetic operation overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// An internal invariant failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// The stable code for this error.
    pub const fn code(&self) -> ErrorCode {
        let (name, number) = match self {
            Self::StatusNotRecognized { .. } => ("StatusNotRecognized", 1),
            Self::GolemBusy { .. } => ("GolemBusy", 2),
            Self::StatusNotAllowedForArchetype { .. } => ("StatusNotAllowedForArchetype", 3),
            Self::GolemLockedForEditing { .. } => ("GolemLockedForEditing", 4),
            Self::InsufficientResourcesHeld { .. } => ("InsufficientResourcesHeld", 5),
            Self::ManifestOverflow { .. } => ("ManifestOverflow", 6),
            Self::NoAvailableRoutes { .. } => ("NoAvailableRoutes", 7),
            Self::TargetRouteUnavailable { .. } => ("TargetRouteUnavailable", 8),
            Self::InsufficientMana { .. } => ("InsufficientMana", 9),
            Self::InvalidPayload(_) => ("InvalidPayload", 10),
            Self::UserNotFound(_) => ("UserNotFound", 11),
            Self::UserAlreadyExists(_) => ("UserAlreadyExists", 12),
            Self::GolemNotFound { .. } => ("GolemNotFound", 13),
            Self::RitualNotKnown(_) => ("RitualNotKnown", 14),
            Self::NoSuchRitual(_) => ("NoSuchRitual", 15),
            Self::ResourceNodeUnavailable { .. } => ("ResourceNodeUnavailable", 16),
            Self::MarketUnavailable { .. } => ("MarketUnavailable", 17),
            Self::ItemNotTraded { .. } => ("ItemNotTraded", 18),
            Self::UnknownItem(_) => ("UnknownItem", 19),
            Self::OrderNotFound(_) => ("OrderNotFound", 20),
            Self::SettlementFailed { .. } => ("SettlementFailed", 21),
            Self::WorldData(_) => ("WorldData", 90),
            Self::Store(_) => ("Store", 91),
            Self::Pricing(_) | Self::Tick(_) | Self::ArithmeticOverflow | Self::Internal(_) => {
                ("Internal", 99)
            }
        };
        ErrorCode { name, number }
    }

    /// The category this error belongs to.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::GolemBusy { .. } | Self::GolemLockedForEditing { .. } => ErrorKind::Contention,
            Self::InsufficientResourcesHeld { .. }
            | Self::ManifestOverflow { .. }
            | Self::InsufficientMana { .. } => ErrorKind::Resource,
            Self::SettlementFailed { .. } => ErrorKind::Settlement,
            Self::WorldData(_)
            | Self::Store(_)
            | Self::Pricing(_)
            | Self::Tick(_)
            | Self::ArithmeticOverflow
            | Self::Internal(_) => ErrorKind::Internal,
            Self::StatusNotRecognized { .. }
            | Self::StatusNotAllowedForArchetype { .. }
            | Self::NoAvailableRoutes { .. }
            | Self::TargetRouteUnavailable { .. }
            | Self::InvalidPayload(_)
            | Self::UserNotFound(_)
            | Self::UserAlreadyExists(_)
            | Self::GolemNotFound { .. }
            | Self::RitualNotKnown(_)
            | Self::NoSuchRitual(_)
            | Self::ResourceNodeUnavailable { .. }
            | Self::MarketUnavailable { .. }
            | Self::ItemNotTraded { .. }
            | Self::UnknownItem(_)
            | Self::OrderNotFound(_) => ErrorKind::Validation,
        }
    }

    /// Whether repeating the same request later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Contention)
    }
}

impl From<InventoryError> for GameError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Insufficient {
                item,
                held,
                requested,
            } => Self::InsufficientResourcesHeld {
                item,
                held,
                requested,
            },
            InventoryError::Overflow { .. } => Self::ArithmeticOverflow,
        }
    }
}
