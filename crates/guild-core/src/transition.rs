//! Status handlers: payload validation and the mutation each status makes.
//!
//! Handlers run on a working copy of the user after
//! [`check_transition`](crate::status::check_transition) has passed. An
//! error leaves the copy in an unspecified state; callers discard it.
//!
//! | Status | Payload | Effect |
//! |--------|---------|--------|
//! | `idle` | `{}` | status idle, detail cleared |
//! | `invoking` | `{}` | status invoking |
//! | `harvesting` | `{"node": id}` | status harvesting, detail = node |
//! | `traveling` | `{"route": id}` | detail = destination, arrival set |
//! | `packing` | `{"manifest": {..}}` | locale to golem, ends idle |
//! | `storing` | `{"manifest": {..}}` | golem to locale, ends idle |
//! | `transacting` | `{"order": Order}` | validated, then spooled by the caller |

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use guild_types::{Golem, GolemStatus, Locale, Order, User};
use guild_world::WorldCatalog;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::error::GameError;
use crate::inventory::{self, weight_of};
use crate::status::StatusRules;

/// What the caller must do after a handler succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    /// The change is fully applied to the working copy.
    Completed,
    /// The order passed validation; the caller spools it and then calls
    /// [`begin_transacting`].
    Transact(Order),
}

#[derive(Debug, Deserialize)]
struct HarvestPayload {
    node: String,
}

#[derive(Debug, Deserialize)]
struct TravelPayload {
    route: String,
}

#[derive(Debug, Deserialize)]
struct ManifestPayload {
    manifest: BTreeMap<String, u64>,
}

#[derive(Debug, Deserialize)]
struct TransactPayload {
    order: Order,
}

fn parse<T: DeserializeOwned>(status: GolemStatus, payload: &Value) -> Result<T, GameError> {
    serde_json::from_value(payload.clone())
        .map_err(|err| GameError::InvalidPayload(format!("{status}: {err}")))
}

fn expect_empty(status: GolemStatus, payload: &Value) -> Result<(), GameError> {
    match payload {
        Value::Null | Value::Object(_) => Ok(()),
        _ => Err(GameError::InvalidPayload(format!(
            "{status}: expected an object"
        ))),
    }
}

fn validate_manifest(manifest: &BTreeMap<String, u64>) -> Result<(), GameError> {
    if manifest.is_empty() {
        return Err(GameError::InvalidPayload("manifest is empty".to_owned()));
    }
    if let Some((item, _)) = manifest.iter().find(|(_, qty)| **qty == 0) {
        return Err(GameError::InvalidPayload(format!(
            "manifest quantity for {item} must be positive"
        )));
    }
    Ok(())
}

fn golem_of<'a>(user: &'a User, golem: &str) -> Result<&'a Golem, GameError> {
    user.golems.get(golem).ok_or_else(|| GameError::GolemNotFound {
        username: user.username.clone(),
        golem: golem.to_owned(),
    })
}

fn golem_mut<'a>(user: &'a mut User, golem: &str) -> Result<&'a mut Golem, GameError> {
    let username = user.username.clone();
    user.golems
        .get_mut(golem)
        .ok_or_else(|| GameError::GolemNotFound {
            username,
            golem: golem.to_owned(),
        })
}

fn locale_of<'w, W: WorldCatalog + ?Sized>(
    world: &'w W,
    golem: &Golem,
) -> Result<&'w Locale, GameError> {
    world.locale(&golem.location_symbol).ok_or_else(|| {
        GameError::WorldData(format!(
            "golem {} stands in unknown locale {}",
            golem.symbol, golem.location_symbol
        ))
    })
}

fn find_ignore_case<'a>(ids: &'a [String], wanted: &str) -> Option<&'a String> {
    ids.iter().find(|id| id.eq_ignore_ascii_case(wanted))
}

/// Apply a validated status change to `user`.
///
/// # Errors
///
/// Returns the handler's validation or resource error; `user` must then be
/// discarded.
pub fn apply<W: WorldCatalog + ?Sized>(
    user: &mut User,
    golem_symbol: &str,
    status: GolemStatus,
    payload: &Value,
    world: &W,
    rules: &StatusRules,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, GameError> {
    let plan = match status {
        GolemStatus::Idle => {
            expect_empty(status, payload)?;
            golem_mut(user, golem_symbol)?.reset_to_idle();
            TransitionPlan::Completed
        }
        GolemStatus::Invoking => {
            expect_empty(status, payload)?;
            let golem = golem_mut(user, golem_symbol)?;
            golem.reset_to_idle();
            golem.status = GolemStatus::Invoking;
            TransitionPlan::Completed
        }
        GolemStatus::Harvesting => {
            let HarvestPayload { node } = parse(status, payload)?;
            begin_harvest(user, golem_symbol, &node, world)?;
            TransitionPlan::Completed
        }
        GolemStatus::Traveling => {
            let TravelPayload { route } = parse(status, payload)?;
            begin_travel(user, golem_symbol, &route, world, rules, now)?;
            TransitionPlan::Completed
        }
        GolemStatus::Packing => {
            let ManifestPayload { manifest } = parse(status, payload)?;
            pack(user, golem_symbol, &manifest, world)?;
            TransitionPlan::Completed
        }
        GolemStatus::Storing => {
            let ManifestPayload { manifest } = parse(status, payload)?;
            store(user, golem_symbol, &manifest)?;
            TransitionPlan::Completed
        }
        GolemStatus::Transacting => {
            let TransactPayload { order } = parse(status, payload)?;
            TransitionPlan::Transact(check_order(user, golem_symbol, order, world)?)
        }
    };

    info!(
        username = %user.username,
        golem = golem_symbol,
        status = %status,
        "golem status change applied"
    );
    Ok(plan)
}

fn begin_harvest<W: WorldCatalog + ?Sized>(
    user: &mut User,
    golem_symbol: &str,
    node: &str,
    world: &W,
) -> Result<(), GameError> {
    let locale = locale_of(world, golem_of(user, golem_symbol)?)?;
    let node_id = find_ignore_case(&locale.resource_node_ids, node)
        .ok_or_else(|| GameError::ResourceNodeUnavailable {
            node: node.to_owned(),
            locale: locale.symbol.clone(),
        })?
        .clone();

    let golem = golem_mut(user, golem_symbol)?;
    golem.reset_to_idle();
    golem.status = GolemStatus::Harvesting;
    golem.status_detail = Some(node_id);
    Ok(())
}

fn begin_travel<W: WorldCatalog + ?Sized>(
    user: &mut User,
    golem_symbol: &str,
    route: &str,
    world: &W,
    rules: &StatusRules,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    let golem = golem_of(user, golem_symbol)?;
    let locale = locale_of(world, golem)?;
    if locale.route_ids.is_empty() {
        return Err(GameError::NoAvailableRoutes {
            locale: locale.symbol.clone(),
        });
    }
    let route_id = find_ignore_case(&locale.route_ids, route).ok_or_else(|| {
        GameError::TargetRouteUnavailable {
            route: route.to_owned(),
            locale: locale.symbol.clone(),
        }
    })?;
    let route = world
        .route(route_id)
        .ok_or_else(|| GameError::WorldData(format!("route {route_id} is not defined")))?;

    let secs = route
        .travel_time
        .checked_mul(rules.travel_time_pct(golem.archetype))
        .and_then(|scaled| scaled.checked_div(100))
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(TimeDelta::try_seconds)
        .ok_or(GameError::ArithmeticOverflow)?;
    let arrival = now
        .checked_add_signed(secs)
        .ok_or(GameError::ArithmeticOverflow)?;
    let destination = route.destination.clone();

    let golem = golem_mut(user, golem_symbol)?;
    golem.status = GolemStatus::Traveling;
    golem.status_detail = Some(destination);
    golem.arrival_time = Some(arrival);
    Ok(())
}

fn pack<W: WorldCatalog + ?Sized>(
    user: &mut User,
    golem_symbol: &str,
    manifest: &BTreeMap<String, u64>,
    world: &W,
) -> Result<(), GameError> {
    validate_manifest(manifest)?;
    let golem = golem_of(user, golem_symbol)?;
    let location = golem.location_symbol.clone();
    let capacity = golem.capacity;

    inventory::ensure_held(&user.inventories, &location, manifest)?;
    let adding = weight_of(manifest, world)?;
    let carried = user
        .inventories
        .get(golem_symbol)
        .map_or(Ok(0), |cargo| weight_of(&cargo.contents, world))?;
    let load = carried
        .checked_add(adding)
        .ok_or(GameError::ArithmeticOverflow)?;
    if load > capacity {
        return Err(GameError::ManifestOverflow { load, capacity });
    }

    inventory::transfer(&mut user.inventories, &location, golem_symbol, manifest)?;
    golem_mut(user, golem_symbol)?.reset_to_idle();
    Ok(())
}

fn store(
    user: &mut User,
    golem_symbol: &str,
    manifest: &BTreeMap<String, u64>,
) -> Result<(), GameError> {
    validate_manifest(manifest)?;
    let location = golem_of(user, golem_symbol)?.location_symbol.clone();
    inventory::transfer(&mut user.inventories, golem_symbol, &location, manifest)?;
    golem_mut(user, golem_symbol)?.reset_to_idle();
    Ok(())
}

fn check_order<W: WorldCatalog + ?Sized>(
    user: &User,
    golem_symbol: &str,
    mut order: Order,
    world: &W,
) -> Result<Order, GameError> {
    if order.quantity == 0 {
        return Err(GameError::InvalidPayload(
            "order quantity must be positive".to_owned(),
        ));
    }
    let golem = golem_of(user, golem_symbol)?;
    let locale = locale_of(world, golem)?;
    let market = find_ignore_case(&locale.market_ids, &order.market_symbol).ok_or_else(|| {
        GameError::MarketUnavailable {
            market: order.market_symbol.clone(),
            locale: locale.symbol.clone(),
        }
    })?;
    order.market_symbol.clone_from(market);

    let held = inventory::held(&user.inventories, golem_symbol, &order.item_symbol);
    if held < order.quantity {
        return Err(GameError::InsufficientResourcesHeld {
            item: order.item_symbol,
            held,
            requested: order.quantity,
        });
    }
    Ok(order)
}

/// Put the golem into `transacting` for a spooled order.
///
/// # Errors
///
/// Returns [`GameError::GolemNotFound`] if the golem is missing.
pub fn begin_transacting(
    user: &mut User,
    golem_symbol: &str,
    reference: &str,
) -> Result<(), GameError> {
    let golem = golem_mut(user, golem_symbol)?;
    golem.reset_to_idle();
    golem.status = GolemStatus::Transacting;
    golem.status_detail = Some(reference.to_owned());
    Ok(())
}
