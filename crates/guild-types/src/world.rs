//! Static world records: locales, routes, resource nodes and items.

use serde::{Deserialize, Serialize};

/// A place golems can stand in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Locale {
    /// World-unique locale id.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Resource nodes that may be harvested here.
    #[serde(default)]
    pub resource_node_ids: Vec<String>,
    /// Routes departing from here.
    #[serde(default)]
    pub route_ids: Vec<String>,
    /// Markets reachable from here.
    #[serde(default)]
    pub market_ids: Vec<String>,
}

/// A one-way connection to a destination locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Route {
    /// World-unique route id, conventionally `<from>|<to>`.
    pub symbol: String,
    /// Destination locale symbol.
    pub destination: String,
    /// Base travel time in seconds.
    pub travel_time: u64,
    /// Informational hazard rating.
    #[serde(default)]
    pub danger_level: u32,
}

/// One possible drop produced by a harvest cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DropEntry {
    /// Item deposited on success.
    pub item_symbol: String,
    /// Success probability per cycle; values at or above 1 always drop.
    pub rarity: f64,
    /// Units deposited per success.
    pub harvest_amount: u64,
}

/// A harvestable site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceNode {
    /// World-unique node id.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Seconds per harvest cycle.
    pub harvest_time: u64,
    /// Drops rolled once per cycle.
    #[serde(default)]
    pub drop_table: Vec<DropEntry>,
}

/// Catalog entry for a tradeable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ItemDef {
    /// World-unique item id.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Weight units one unit occupies in a golem's cargo.
    pub capacity_per_unit: u64,
}
