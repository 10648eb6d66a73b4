//! Registration and golem-summoning rituals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use guild_types::{Golem, Inventory, ManaDetails, User};

use crate::config::GameConfig;
use crate::error::GameError;
use crate::status::StatusRules;

/// A freshly registered user with the configured starting values.
pub fn starting_user(username: &str, now: DateTime<Utc>, config: &GameConfig) -> User {
    let inventories = config
        .user
        .starting_inventory
        .iter()
        .map(|(location, contents)| {
            let mut inventory = Inventory::new(location.as_str());
            inventory.contents = contents
                .iter()
                .filter(|(_, qty)| **qty > 0)
                .map(|(item, qty)| (item.clone(), *qty))
                .collect();
            (location.clone(), inventory)
        })
        .filter(|(_, inventory)| !inventory.is_empty())
        .collect();

    User {
        username: username.to_owned(),
        coins: config.user.starting_coins,
        mana: ManaDetails {
            mana: config.mana.starting_mana.min(config.mana.mana_cap),
            mana_cap: config.mana.mana_cap,
            mana_regen: config.mana.mana_regen,
            last_mana_tick: now,
        },
        golems: BTreeMap::new(),
        inventories,
        last_harvest_tick: now,
        known_rituals: config.user.starting_rituals.iter().cloned().collect(),
        user_since: now,
    }
}

/// Perform a summoning ritual on `user`, returning the new golem.
///
/// The golem is named `<ABBR>-<n>` where `n` is the number of golems of
/// that archetype the user already has, bumped past any symbol still in
/// use. Mana is deducted and the golem inserted into `user`.
///
/// # Errors
///
/// Returns [`GameError::NoSuchRitual`], [`GameError::RitualNotKnown`] or
/// [`GameError::InsufficientMana`].
pub fn perform_ritual(
    user: &mut User,
    ritual: &str,
    config: &GameConfig,
    rules: &StatusRules,
) -> Result<Golem, GameError> {
    let definition = config
        .rituals
        .get(ritual)
        .ok_or_else(|| GameError::NoSuchRitual(ritual.to_owned()))?;
    if !user.known_rituals.contains(ritual) {
        return Err(GameError::RitualNotKnown(ritual.to_owned()));
    }
    if user.mana.mana < definition.mana_cost {
        return Err(GameError::InsufficientMana {
            have: user.mana.mana,
            requires: definition.mana_cost,
        });
    }

    let archetype = definition.archetype;
    let mut n = user.golems_of(archetype);
    let symbol = loop {
        let candidate = format!("{}-{n}", archetype.abbreviation());
        if !user.golems.contains_key(&candidate) {
            break candidate;
        }
        n = n.checked_add(1).ok_or(GameError::ArithmeticOverflow)?;
    };

    let golem = Golem {
        symbol: symbol.clone(),
        archetype,
        location_symbol: config.user.starting_location.clone(),
        status: definition.starting_status,
        status_detail: None,
        arrival_time: None,
        capacity: rules.capacity(archetype),
    };
    user.mana.mana -= definition.mana_cost;
    user.golems.insert(symbol, golem.clone());
    Ok(golem)
}
