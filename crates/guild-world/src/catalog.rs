//! The world catalog: read-only lookups over static world records.
//!
//! World data never changes while the process runs. [`StaticWorld`] indexes
//! a [`WorldDefinition`] by symbol and checks that every cross-reference
//! (locale to route, route to destination, node to item) resolves before
//! the catalog is handed to anything else.

use std::collections::BTreeMap;
use std::path::Path;

use guild_types::{ItemDef, Locale, Market, ResourceNode, Route};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WorldError;

/// Lookup interface over static world data.
pub trait WorldCatalog: Send + Sync {
    /// Locale by symbol.
    fn locale(&self, symbol: &str) -> Option<&Locale>;
    /// Route by symbol.
    fn route(&self, symbol: &str) -> Option<&Route>;
    /// Resource node by symbol.
    fn resource_node(&self, symbol: &str) -> Option<&ResourceNode>;
    /// Item definition by symbol.
    fn item(&self, symbol: &str) -> Option<&ItemDef>;
}

/// Serialized shape of a world file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorldDefinition {
    /// All locales.
    #[serde(default)]
    pub locales: Vec<Locale>,
    /// All routes.
    #[serde(default)]
    pub routes: Vec<Route>,
    /// All resource nodes.
    #[serde(default)]
    pub resource_nodes: Vec<ResourceNode>,
    /// The item catalog.
    #[serde(default)]
    pub items: Vec<ItemDef>,
}

/// An in-memory, validated world catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticWorld {
    locales: BTreeMap<String, Locale>,
    routes: BTreeMap<String, Route>,
    resource_nodes: BTreeMap<String, ResourceNode>,
    items: BTreeMap<String, ItemDef>,
}

impl StaticWorld {
    /// Index and validate a world definition.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Duplicate`] when two records share a symbol and
    /// [`WorldError::DanglingReference`] or
    /// [`WorldError::InvalidResourceNode`] when validation fails.
    pub fn from_definition(definition: WorldDefinition) -> Result<Self, WorldError> {
        let world = Self {
            locales: index("locale", definition.locales, |l| &l.symbol)?,
            routes: index("route", definition.routes, |r| &r.symbol)?,
            resource_nodes: index("resource node", definition.resource_nodes, |n| &n.symbol)?,
            items: index("item", definition.items, |i| &i.symbol)?,
        };
        world.validate()?;
        Ok(world)
    }

    /// Parse a world definition from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, WorldError> {
        let definition: WorldDefinition = serde_json::from_str(json)?;
        Self::from_definition(definition)
    }

    /// Load a world definition from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let world = Self::from_json_str(&contents)?;
        info!(
            path = %path.display(),
            locales = world.locales.len(),
            routes = world.routes.len(),
            "world file loaded"
        );
        Ok(world)
    }

    /// Check that every cross-reference resolves.
    pub fn validate(&self) -> Result<(), WorldError> {
        for locale in self.locales.values() {
            for route_id in &locale.route_ids {
                require(&self.routes, "route", &locale.symbol, route_id)?;
            }
            for node_id in &locale.resource_node_ids {
                require(&self.resource_nodes, "resource node", &locale.symbol, node_id)?;
            }
        }

        for route in self.routes.values() {
            require(&self.locales, "locale", &route.symbol, &route.destination)?;
        }

        for node in self.resource_nodes.values() {
            if node.harvest_time == 0 {
                return Err(WorldError::InvalidResourceNode {
                    symbol: node.symbol.clone(),
                    reason: "harvest time is zero".to_owned(),
                });
            }
            for entry in &node.drop_table {
                if !entry.rarity.is_finite() || entry.rarity < 0.0 {
                    return Err(WorldError::InvalidResourceNode {
                        symbol: node.symbol.clone(),
                        reason: format!("rarity of {} is not a probability", entry.item_symbol),
                    });
                }
                require(&self.items, "item", &node.symbol, &entry.item_symbol)?;
            }
        }
        Ok(())
    }

    /// Check a market set against this world: every market a locale lists
    /// must exist, and every priced item must be in the catalog with a
    /// usable curve.
    pub fn check_markets(&self, markets: &[Market]) -> Result<(), WorldError> {
        for locale in self.locales.values() {
            for market_id in &locale.market_ids {
                if !markets.iter().any(|m| &m.symbol == market_id) {
                    return Err(WorldError::DanglingReference {
                        kind: "market",
                        from: locale.symbol.clone(),
                        target: market_id.clone(),
                    });
                }
            }
        }

        for market in markets {
            for (item, pricing) in &market.pricing {
                require(&self.items, "item", &market.symbol, item)?;
                if pricing.sensitivity == 0 || pricing.max < pricing.min {
                    return Err(WorldError::InvalidPricing {
                        market: market.symbol.clone(),
                        item: item.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Iterate over all locales in symbol order.
    pub fn locales(&self) -> impl Iterator<Item = &Locale> {
        self.locales.values()
    }

    /// Number of routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl WorldCatalog for StaticWorld {
    fn locale(&self, symbol: &str) -> Option<&Locale> {
        self.locales.get(symbol)
    }

    fn route(&self, symbol: &str) -> Option<&Route> {
        self.routes.get(symbol)
    }

    fn resource_node(&self, symbol: &str) -> Option<&ResourceNode> {
        self.resource_nodes.get(symbol)
    }

    fn item(&self, symbol: &str) -> Option<&ItemDef> {
        self.items.get(symbol)
    }
}

/// Parse a JSON array of markets.
pub fn markets_from_json_str(json: &str) -> Result<Vec<Market>, WorldError> {
    Ok(serde_json::from_str(json)?)
}

/// Load a JSON array of markets from a file.
pub fn markets_from_file(path: impl AsRef<Path>) -> Result<Vec<Market>, WorldError> {
    let contents = std::fs::read_to_string(path)?;
    markets_from_json_str(&contents)
}

fn index<T>(
    kind: &'static str,
    records: Vec<T>,
    key: impl Fn(&T) -> &String,
) -> Result<BTreeMap<String, T>, WorldError> {
    let mut map = BTreeMap::new();
    for record in records {
        let symbol = key(&record).clone();
        if map.contains_key(&symbol) {
            return Err(WorldError::Duplicate { kind, symbol });
        }
        map.insert(symbol, record);
    }
    Ok(map)
}

fn require<T>(
    map: &BTreeMap<String, T>,
    kind: &'static str,
    from: &str,
    target: &str,
) -> Result<(), WorldError> {
    if map.contains_key(target) {
        Ok(())
    } else {
        Err(WorldError::DanglingReference {
            kind,
            from: from.to_owned(),
            target: target.to_owned(),
        })
    }
}
