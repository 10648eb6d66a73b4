//! Enumeration types for the Guild Golems simulation.
//!
//! Golem archetypes and statuses use lowercase names on the wire, matching
//! the strings players send in status-change requests. Order statuses use
//! their variant names (`Spooled`, `InProcessing`, ...).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enumeration was being parsed (e.g. "golem status").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Archetypes
// ---------------------------------------------------------------------------

/// A golem's class. Determines which statuses it may enter and its
/// carrying capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    /// Generates mana while invoking.
    Invoker,
    /// Gathers resources from resource nodes.
    Harvester,
    /// Moves cargo between locales.
    Courier,
    /// Crafts goods from ingredients.
    Artisan,
    /// Trades cargo on markets.
    Merchant,
}

impl Archetype {
    /// Every archetype, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Invoker,
        Self::Harvester,
        Self::Courier,
        Self::Artisan,
        Self::Merchant,
    ];

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoker => "invoker",
            Self::Harvester => "harvester",
            Self::Courier => "courier",
            Self::Artisan => "artisan",
            Self::Merchant => "merchant",
        }
    }

    /// Prefix used when minting golem symbols (`INV-0`, `HAR-3`, ...).
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Invoker => "INV",
            Self::Harvester => "HAR",
            Self::Courier => "COU",
            Self::Artisan => "ART",
            Self::Merchant => "MER",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "archetype",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Golem statuses
// ---------------------------------------------------------------------------

/// The single task a golem is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GolemStatus {
    /// Doing nothing; accepts any allowed transition.
    Idle,
    /// Accruing drops from a resource node at its location.
    Harvesting,
    /// En route to a destination locale.
    Traveling,
    /// Contributing to its owner's mana regeneration.
    Invoking,
    /// Loading cargo from the location inventory.
    Packing,
    /// Unloading cargo into the location inventory.
    Storing,
    /// Waiting for a market order to settle.
    Transacting,
}

impl GolemStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Idle,
        Self::Harvesting,
        Self::Traveling,
        Self::Invoking,
        Self::Packing,
        Self::Storing,
        Self::Transacting,
    ];

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Harvesting => "harvesting",
            Self::Traveling => "traveling",
            Self::Invoking => "invoking",
            Self::Packing => "packing",
            Self::Storing => "storing",
            Self::Transacting => "transacting",
        }
    }

    /// Whether a golem in this status must be resolved (by recomputation or
    /// settlement) before it accepts another transition.
    pub const fn is_blocking(self) -> bool {
        match self {
            Self::Idle | Self::Harvesting => false,
            Self::Traveling
            | Self::Invoking
            | Self::Packing
            | Self::Storing
            | Self::Transacting => true,
        }
    }
}

impl fmt::Display for GolemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GolemStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "golem status",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// The kind of trade an order performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Sell items from a golem's inventory into market stock.
    #[serde(rename = "SELL")]
    Sell,
}

impl OrderType {
    /// Uppercase name as it appears in order references.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a spooled market order.
///
/// The lifecycle is strictly monotonic:
///
/// ```text
/// Spooled -> Queued -> InProcessing -+-> InExecuting  -> Executed
///                                    +-> InCancelling -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted and held, not yet admitted to the queue.
    Spooled,
    /// Admitted to the clearinghouse queue.
    Queued,
    /// Dequeued by the clearinghouse worker.
    InProcessing,
    /// Price check passed; effects are being applied.
    InExecuting,
    /// Terminal: effects applied.
    Executed,
    /// Price check failed or settlement could not proceed.
    InCancelling,
    /// Terminal: no effects applied.
    Cancelled,
}

impl OrderStatus {
    /// Whether the lifecycle permits moving from `self` directly to `next`.
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Spooled, Self::Queued)
                | (Self::Queued, Self::InProcessing)
                | (Self::InProcessing, Self::InExecuting | Self::InCancelling)
                | (Self::InExecuting, Self::Executed)
                | (Self::InCancelling, Self::Cancelled)
        )
    }

    /// Whether this status ends the lifecycle.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Cancelled)
    }

    /// Variant name as used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spooled => "Spooled",
            Self::Queued => "Queued",
            Self::InProcessing => "InProcessing",
            Self::InExecuting => "InExecuting",
            Self::Executed => "Executed",
            Self::InCancelling => "InCancelling",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
