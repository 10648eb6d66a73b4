//! Persisted entity structs: golems, inventories, users, orders and markets.
//!
//! Every record serializes with kebab-case field names. The [`User`] record
//! is the aggregate root and the unit of persistence; all writes after
//! creation address one of its sub-paths.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Archetype, GolemStatus, OrderStatus, OrderType};
use crate::ids::OrderId;

// ---------------------------------------------------------------------------
// Golem
// ---------------------------------------------------------------------------

/// A player-owned worker unit running one task at a time.
///
/// The golem's cargo lives in the owner's inventory map keyed by the golem
/// symbol, not on this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Golem {
    /// Unique per user, `<ABBR>-<n>`.
    pub symbol: String,
    /// Determines allowed statuses and capacity.
    pub archetype: Archetype,
    /// Locale the golem currently stands in.
    pub location_symbol: String,
    /// The task currently running.
    pub status: GolemStatus,
    /// Node id while harvesting, destination while traveling, order
    /// reference while transacting.
    #[serde(default)]
    pub status_detail: Option<String>,
    /// Set only while traveling.
    #[serde(default)]
    pub arrival_time: Option<DateTime<Utc>>,
    /// Carrying capacity in weight units.
    pub capacity: u64,
}

impl Golem {
    /// Whether the golem's current status blocks further transitions.
    pub const fn is_busy(&self) -> bool {
        self.status.is_blocking()
    }

    /// Return the golem to `idle` with no detail or arrival time.
    pub fn reset_to_idle(&mut self) {
        self.status = GolemStatus::Idle;
        self.status_detail = None;
        self.arrival_time = None;
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Item quantities held at one location (a locale or a golem).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Inventory {
    /// Locale symbol or golem symbol this inventory is attached to.
    pub location_symbol: String,
    /// Item symbol to quantity. Zero quantities are never stored.
    #[serde(default)]
    pub contents: BTreeMap<String, u64>,
}

impl Inventory {
    /// Create an empty inventory for a location.
    pub fn new(location_symbol: impl Into<String>) -> Self {
        Self {
            location_symbol: location_symbol.into(),
            contents: BTreeMap::new(),
        }
    }

    /// Quantity held of `item`, zero when absent.
    pub fn quantity(&self, item: &str) -> u64 {
        self.contents.get(item).copied().unwrap_or(0)
    }

    /// Whether the inventory holds nothing.
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Mana pool and regeneration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManaDetails {
    /// Current mana.
    pub mana: f64,
    /// Upper bound on `mana`.
    pub mana_cap: f64,
    /// Base regeneration per second, before invoker bonuses.
    pub mana_regen: f64,
    /// When mana was last recomputed.
    pub last_mana_tick: DateTime<Utc>,
}

/// A player account and everything it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(clippy::struct_field_names)]
pub struct User {
    /// Unique account name.
    pub username: String,
    /// Spendable currency.
    pub coins: u64,
    /// Mana pool.
    pub mana: ManaDetails,
    /// Golem symbol to golem.
    #[serde(default)]
    pub golems: BTreeMap<String, Golem>,
    /// Location id (locale or golem symbol) to inventory.
    #[serde(default)]
    pub inventories: BTreeMap<String, Inventory>,
    /// When harvest accrual was last computed.
    pub last_harvest_tick: DateTime<Utc>,
    /// Rituals this user may perform.
    #[serde(default)]
    pub known_rituals: BTreeSet<String>,
    /// Registration time.
    pub user_since: DateTime<Utc>,
}

impl User {
    /// Number of golems currently `invoking`.
    pub fn invoking_count(&self) -> usize {
        self.golems
            .values()
            .filter(|g| g.status == GolemStatus::Invoking)
            .count()
    }

    /// Number of golems of the given archetype.
    pub fn golems_of(&self, archetype: Archetype) -> usize {
        self.golems
            .values()
            .filter(|g| g.archetype == archetype)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// A trade request. Immutable once spooled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(clippy::struct_field_names)]
pub struct Order {
    /// Kind of trade.
    pub order_type: OrderType,
    /// Market the trade settles on.
    pub market_symbol: String,
    /// Item being traded.
    pub item_symbol: String,
    /// Units to trade, always positive.
    pub quantity: u64,
    /// Minimum acceptable unit price for a sell.
    pub target_price: u64,
    /// Settle at spot even when spot is below target.
    #[serde(default)]
    pub force_execution: bool,
}

/// An order held in the clearinghouse order table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarketOrder {
    /// Internal key.
    pub id: OrderId,
    /// Human-readable reference returned to callers.
    pub reference: String,
    /// Owning user.
    pub username: String,
    /// Golem carrying the goods.
    pub golem_symbol: String,
    /// Lifecycle position.
    pub status: OrderStatus,
    /// The trade itself.
    pub order: Order,
    /// When the order entered the spool.
    pub spooled_at: DateTime<Utc>,
    /// Every status the order has held, oldest first.
    #[serde(default)]
    pub history: Vec<OrderStatus>,
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// Price curve parameters for one item on one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PricingInfo {
    /// Floor price.
    pub min: u64,
    /// Price approached as stock falls to zero.
    pub max: u64,
    /// Stock level at which the price sits halfway between the bounds.
    pub sensitivity: u64,
}

/// A shared market with drifting stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Market {
    /// World-unique market id.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Item to price curve. Only priced items are traded.
    #[serde(default)]
    pub pricing: BTreeMap<String, PricingInfo>,
    /// Item to units in stock.
    #[serde(default)]
    pub stock: BTreeMap<String, u64>,
    /// Item to units consumed per drift tick.
    #[serde(default)]
    pub consumption: BTreeMap<String, u64>,
    /// Item to units produced per drift tick.
    #[serde(default)]
    pub production: BTreeMap<String, u64>,
    /// Anchor for drift recomputation. Seed files may omit it, in which
    /// case drift starts from load time.
    #[serde(default = "Utc::now")]
    pub last_drift_tick: DateTime<Utc>,
}

impl Market {
    /// Units of `item` in stock, zero when absent.
    pub fn stock_of(&self, item: &str) -> u64 {
        self.stock.get(item).copied().unwrap_or(0)
    }
}
