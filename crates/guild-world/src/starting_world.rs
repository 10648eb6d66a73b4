//! Built-in starting world used when no world file is configured.
//!
//! Three locales around the starting city of Aldergate (`A-G`): the
//! Aldergate Forest (`A-F`) to the north and the Aldergate Mines (`A-M`)
//! to the east, connected by return routes. Aldergate and the Mines each
//! host a market.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use guild_types::{DropEntry, ItemDef, Locale, Market, PricingInfo, ResourceNode, Route};

use crate::catalog::{StaticWorld, WorldDefinition};
use crate::error::WorldError;

/// Locale new users and new golems start in.
pub const STARTING_LOCALE: &str = "A-G";

/// Market hosted in the starting locale.
pub const STARTING_MARKET: &str = "A-G-MARKET";

fn locale(symbol: &str, name: &str, nodes: &[&str], routes: &[&str], markets: &[&str]) -> Locale {
    Locale {
        symbol: symbol.to_owned(),
        name: name.to_owned(),
        resource_node_ids: nodes.iter().map(|s| (*s).to_owned()).collect(),
        route_ids: routes.iter().map(|s| (*s).to_owned()).collect(),
        market_ids: markets.iter().map(|s| (*s).to_owned()).collect(),
    }
}

fn route(from: &str, to: &str, travel_time: u64, danger_level: u32) -> Route {
    Route {
        symbol: format!("{from}|{to}"),
        destination: to.to_owned(),
        travel_time,
        danger_level,
    }
}

fn drop_entry(item: &str, rarity: f64, harvest_amount: u64) -> DropEntry {
    DropEntry {
        item_symbol: item.to_owned(),
        rarity,
        harvest_amount,
    }
}

fn item(symbol: &str, name: &str, capacity_per_unit: u64) -> ItemDef {
    ItemDef {
        symbol: symbol.to_owned(),
        name: name.to_owned(),
        capacity_per_unit,
    }
}

/// The raw definition of the starting world.
pub fn starting_definition() -> WorldDefinition {
    WorldDefinition {
        locales: vec![
            locale(
                "A-G",
                "Aldergate",
                &["A-G-WOODLOT"],
                &["A-G|A-F", "A-G|A-M"],
                &[STARTING_MARKET],
            ),
            locale("A-F", "Aldergate Forest", &["A-F-GROVE"], &["A-F|A-G"], &[]),
            locale(
                "A-M",
                "Aldergate Mines",
                &["A-M-QUARRY"],
                &["A-M|A-G"],
                &["A-M-MARKET"],
            ),
        ],
        routes: vec![
            route("A-G", "A-F", 300, 1),
            route("A-F", "A-G", 300, 1),
            route("A-G", "A-M", 600, 2),
            route("A-M", "A-G", 600, 2),
        ],
        resource_nodes: vec![
            ResourceNode {
                symbol: "A-G-WOODLOT".to_owned(),
                name: "Aldergate Woodlot".to_owned(),
                harvest_time: 60,
                drop_table: vec![drop_entry("LOGS", 1.0, 5)],
            },
            ResourceNode {
                symbol: "A-F-GROVE".to_owned(),
                name: "Old Growth Grove".to_owned(),
                harvest_time: 120,
                drop_table: vec![drop_entry("LOGS", 1.0, 8), drop_entry("RESIN", 0.25, 1)],
            },
            ResourceNode {
                symbol: "A-M-QUARRY".to_owned(),
                name: "Eastern Quarry".to_owned(),
                harvest_time: 180,
                drop_table: vec![drop_entry("STONE", 1.0, 4), drop_entry("ORE", 0.5, 2)],
            },
        ],
        items: vec![
            item("LOGS", "Logs", 1),
            item("RESIN", "Resin", 1),
            item("STONE", "Stone", 2),
            item("ORE", "Iron Ore", 3),
        ],
    }
}

/// Build and validate the starting world catalog.
///
/// # Errors
///
/// Returns [`WorldError`] if the built-in data fails validation.
pub fn starting_world() -> Result<StaticWorld, WorldError> {
    StaticWorld::from_definition(starting_definition())
}

fn curve(min: u64, max: u64, sensitivity: u64) -> PricingInfo {
    PricingInfo {
        min,
        max,
        sensitivity,
    }
}

fn table(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
    entries
        .iter()
        .map(|(item, qty)| ((*item).to_owned(), *qty))
        .collect()
}

/// The starting markets, with drift anchored at `now`.
pub fn starting_markets(now: DateTime<Utc>) -> Vec<Market> {
    vec![
        Market {
            symbol: STARTING_MARKET.to_owned(),
            name: "Aldergate Exchange".to_owned(),
            pricing: BTreeMap::from([
                ("LOGS".to_owned(), curve(10, 110, 50)),
                ("RESIN".to_owned(), curve(30, 200, 20)),
                ("STONE".to_owned(), curve(20, 160, 40)),
            ]),
            stock: table(&[("LOGS", 50), ("RESIN", 5), ("STONE", 40)]),
            consumption: table(&[("LOGS", 6), ("RESIN", 1), ("STONE", 3)]),
            production: table(&[("LOGS", 2)]),
            last_drift_tick: now,
        },
        Market {
            symbol: "A-M-MARKET".to_owned(),
            name: "Minehead Trading Post".to_owned(),
            pricing: BTreeMap::from([
                ("LOGS".to_owned(), curve(15, 140, 30)),
                ("ORE".to_owned(), curve(45, 300, 25)),
                ("STONE".to_owned(), curve(8, 60, 80)),
            ]),
            stock: table(&[("LOGS", 10), ("ORE", 25), ("STONE", 200)]),
            consumption: table(&[("LOGS", 4), ("ORE", 2)]),
            production: table(&[("STONE", 10), ("ORE", 1)]),
            last_drift_tick: now,
        },
    ]
}
