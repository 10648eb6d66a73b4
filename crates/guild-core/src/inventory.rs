//! Inventory operations over a user's location-keyed inventory map.
//!
//! Inventories are keyed by location id: a locale symbol for goods stored
//! in a locale, or a golem symbol for a golem's cargo. All arithmetic is
//! checked. An item whose quantity reaches zero is removed, and an
//! inventory left with no contents is removed from the map.

use std::collections::BTreeMap;

use guild_types::Inventory;
use guild_world::WorldCatalog;

use crate::error::GameError;

/// Errors from inventory mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// The inventory does not hold enough of an item.
    #[error("insufficient {item}: have {held}, requested {requested}")]
    Insufficient {
        /// The item symbol.
        item: String,
        /// Quantity held.
        held: u64,
        /// Quantity requested.
        requested: u64,
    },

    /// Adding would overflow the stored quantity.
    #[error("inventory overflow adding {quantity} {item}")]
    Overflow {
        /// The item symbol.
        item: String,
        /// Quantity being added.
        quantity: u64,
    },
}

/// The user's inventory map: location id to inventory.
pub type Inventories = BTreeMap<String, Inventory>;

/// Quantity of `item` held at `location`.
pub fn held(inventories: &Inventories, location: &str, item: &str) -> u64 {
    inventories
        .get(location)
        .map_or(0, |inventory| inventory.quantity(item))
}

/// Add `quantity` of `item` to the inventory at `location`, creating the
/// inventory if needed. A zero quantity is a no-op.
pub fn deposit(
    inventories: &mut Inventories,
    location: &str,
    item: &str,
    quantity: u64,
) -> Result<(), InventoryError> {
    if quantity == 0 {
        return Ok(());
    }
    let current = held(inventories, location, item);
    let next = current
        .checked_add(quantity)
        .ok_or_else(|| InventoryError::Overflow {
            item: item.to_owned(),
            quantity,
        })?;
    inventories
        .entry(location.to_owned())
        .or_insert_with(|| Inventory::new(location))
        .contents
        .insert(item.to_owned(), next);
    Ok(())
}

/// Remove `quantity` of `item` from the inventory at `location`.
pub fn withdraw(
    inventories: &mut Inventories,
    location: &str,
    item: &str,
    quantity: u64,
) -> Result<(), InventoryError> {
    let current = held(inventories, location, item);
    let remaining = current
        .checked_sub(quantity)
        .ok_or_else(|| InventoryError::Insufficient {
            item: item.to_owned(),
            held: current,
            requested: quantity,
        })?;

    if let Some(inventory) = inventories.get_mut(location) {
        if remaining == 0 {
            inventory.contents.remove(item);
        } else {
            inventory.contents.insert(item.to_owned(), remaining);
        }
        if inventory.is_empty() {
            inventories.remove(location);
        }
    }
    Ok(())
}

/// Check that `location` holds every quantity in `manifest`.
pub fn ensure_held(
    inventories: &Inventories,
    location: &str,
    manifest: &BTreeMap<String, u64>,
) -> Result<(), InventoryError> {
    for (item, &requested) in manifest {
        let have = held(inventories, location, item);
        if have < requested {
            return Err(InventoryError::Insufficient {
                item: item.clone(),
                held: have,
                requested,
            });
        }
    }
    Ok(())
}

/// Move every item of `manifest` from one location to another.
///
/// The whole manifest is checked before anything moves, so a shortfall
/// leaves both inventories untouched.
pub fn transfer(
    inventories: &mut Inventories,
    from: &str,
    to: &str,
    manifest: &BTreeMap<String, u64>,
) -> Result<(), InventoryError> {
    ensure_held(inventories, from, manifest)?;
    let mut working = inventories.clone();
    for (item, &quantity) in manifest {
        withdraw(&mut working, from, item, quantity)?;
        deposit(&mut working, to, item, quantity)?;
    }
    *inventories = working;
    Ok(())
}

/// Total weight of an item map under the world's per-unit capacities.
pub fn weight_of<W: WorldCatalog + ?Sized>(
    contents: &BTreeMap<String, u64>,
    world: &W,
) -> Result<u64, GameError> {
    let mut total: u64 = 0;
    for (item, &quantity) in contents {
        let def = world
            .item(item)
            .ok_or_else(|| GameError::UnknownItem(item.clone()))?;
        total = quantity
            .checked_mul(def.capacity_per_unit)
            .and_then(|w| total.checked_add(w))
            .ok_or(GameError::ArithmeticOverflow)?;
    }
    Ok(total)
}
