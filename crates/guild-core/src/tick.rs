//! Lazy, time-driven recomputation of user and market state.
//!
//! Nothing in the simulation runs on a timer. Every operation that reads
//! or mutates a user first brings that user up to `now`:
//!
//! 1. **Mana** regenerates at the base rate plus a bonus per invoking golem.
//! 2. **Arrivals** complete for every traveling golem whose arrival time has
//!    passed.
//! 3. **Harvests** accrue whole cycles for every harvesting golem since the
//!    last harvest tick.
//!
//! Markets drift the same way: consumption and production are applied in
//! whole drift ticks when a market is read for settlement or a quote.
//!
//! Each step is idempotent: running it twice at the same `now` changes
//! nothing the second time.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use guild_types::{DropEntry, GolemStatus, Market, User};
use guild_world::WorldCatalog;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::ManaConfig;
use crate::inventory::{self, InventoryError};

/// Errors from recomputation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    /// A checked arithmetic operation overflowed.
    #[error("arithmetic overflow during recompute")]
    ArithmeticOverflow,

    /// Depositing harvested goods failed.
    #[error("harvest deposit failed: {0}")]
    Inventory(#[from] InventoryError),
}

/// What a call to [`recompute_user`] changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecomputeSummary {
    /// Mana added by regeneration (after the cap).
    pub mana_gained: f64,
    /// Symbols of golems that arrived.
    pub arrivals: Vec<String>,
    /// Item symbol to units deposited by harvesting golems.
    pub harvested: BTreeMap<String, u64>,
}

/// Seconds from `since` to `now`, clamped at zero.
#[allow(clippy::cast_precision_loss)]
fn elapsed_secs_f64(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = now.signed_duration_since(since).num_milliseconds().max(0);
    millis as f64 / 1000.0
}

/// Whole seconds from `since` to `now`, clamped at zero.
fn elapsed_whole_secs(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from(now.signed_duration_since(since).num_seconds()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Mana
// ---------------------------------------------------------------------------

/// Regenerate the user's mana up to `now` and return the amount gained.
///
/// The regeneration anchor moves to `now`, even when the pool is already
/// capped. A `now` earlier than the anchor adds nothing and leaves the
/// anchor where it is.
pub fn regenerate_mana(user: &mut User, now: DateTime<Utc>, invoker_potency: f64) -> f64 {
    let elapsed = elapsed_secs_f64(user.mana.last_mana_tick, now);
    let invoking = u32::try_from(user.invoking_count()).map_or(f64::from(u32::MAX), f64::from);
    let rate = invoking.mul_add(invoker_potency, user.mana.mana_regen);

    let before = user.mana.mana;
    user.mana.mana = elapsed.mul_add(rate, before).min(user.mana.mana_cap);
    user.mana.last_mana_tick = user.mana.last_mana_tick.max(now);

    (user.mana.mana - before).max(0.0)
}

// ---------------------------------------------------------------------------
// Travel
// ---------------------------------------------------------------------------

/// Complete every journey whose arrival time is at or before `now`.
///
/// Returns the symbols of the golems that arrived.
pub fn complete_arrivals(user: &mut User, now: DateTime<Utc>) -> Vec<String> {
    let mut arrived = Vec::new();
    for golem in user.golems.values_mut() {
        if golem.status != GolemStatus::Traveling {
            continue;
        }
        if !golem.arrival_time.is_none_or(|at| at <= now) {
            continue;
        }
        if let Some(destination) = golem.status_detail.take() {
            golem.location_symbol = destination;
        }
        golem.reset_to_idle();
        debug!(golem = %golem.symbol, location = %golem.location_symbol, "golem arrived");
        arrived.push(golem.symbol.clone());
    }
    arrived
}

// ---------------------------------------------------------------------------
// Harvest
// ---------------------------------------------------------------------------

/// Deposit whole harvest cycles since the last harvest tick.
///
/// Each cycle rolls every drop-table entry once; an entry with rarity of
/// one or more always drops. Goods land in the inventory at the golem's
/// current location.
///
/// # Errors
///
/// Returns [`TickError`] if a yield or deposit overflows.
pub fn accrue_harvests<W: WorldCatalog + ?Sized>(
    user: &mut User,
    now: DateTime<Utc>,
    world: &W,
    rng: &mut impl Rng,
) -> Result<BTreeMap<String, u64>, TickError> {
    let elapsed = elapsed_whole_secs(user.last_harvest_tick, now);
    let mut deposits: Vec<(String, String, u64)> = Vec::new();

    for golem in user.golems.values() {
        if golem.status != GolemStatus::Harvesting {
            continue;
        }
        let Some(node_symbol) = golem.status_detail.as_deref() else {
            warn!(golem = %golem.symbol, "harvesting golem has no node, skipping");
            continue;
        };
        let Some(node) = world.resource_node(node_symbol) else {
            warn!(golem = %golem.symbol, node = node_symbol, "unknown resource node, skipping");
            continue;
        };
        let Some(cycles) = elapsed.checked_div(node.harvest_time) else {
            warn!(node = node_symbol, "resource node has zero harvest time, skipping");
            continue;
        };
        if cycles == 0 {
            continue;
        }

        for entry in &node.drop_table {
            let units = roll_yield(entry, cycles, &mut *rng)?;
            if units > 0 {
                deposits.push((golem.location_symbol.clone(), entry.item_symbol.clone(), units));
            }
        }
    }

    let mut harvested = BTreeMap::new();
    for (location, item, units) in deposits {
        inventory::deposit(&mut user.inventories, &location, &item, units)?;
        let total: &mut u64 = harvested.entry(item).or_default();
        *total = total.checked_add(units).ok_or(TickError::ArithmeticOverflow)?;
    }
    user.last_harvest_tick = user.last_harvest_tick.max(now);
    Ok(harvested)
}

/// Units one drop-table entry yields over `cycles` harvest cycles.
fn roll_yield(entry: &DropEntry, cycles: u64, rng: &mut impl Rng) -> Result<u64, TickError> {
    if entry.rarity >= 1.0 {
        return entry
            .harvest_amount
            .checked_mul(cycles)
            .ok_or(TickError::ArithmeticOverflow);
    }
    let mut hits: u64 = 0;
    for _ in 0..cycles {
        if rng.random::<f64>() < entry.rarity {
            hits = hits.checked_add(1).ok_or(TickError::ArithmeticOverflow)?;
        }
    }
    hits.checked_mul(entry.harvest_amount)
        .ok_or(TickError::ArithmeticOverflow)
}

/// Bring a user up to `now`: mana, then arrivals, then harvests.
///
/// # Errors
///
/// Returns [`TickError`] if harvest accrual overflows.
pub fn recompute_user<W: WorldCatalog + ?Sized>(
    user: &mut User,
    now: DateTime<Utc>,
    world: &W,
    mana: &ManaConfig,
    rng: &mut impl Rng,
) -> Result<RecomputeSummary, TickError> {
    let mana_gained = regenerate_mana(user, now, mana.invoker_potency);
    let arrivals = complete_arrivals(user, now);
    let harvested = accrue_harvests(user, now, world, rng)?;
    Ok(RecomputeSummary {
        mana_gained,
        arrivals,
        harvested,
    })
}

// ---------------------------------------------------------------------------
// Market drift
// ---------------------------------------------------------------------------

/// Apply whole drift ticks of consumption and production to a market.
///
/// Consumption is applied before production and floors at zero. The drift
/// anchor advances by whole ticks only, so any remainder carries over to
/// the next call. Returns the number of ticks applied.
///
/// # Errors
///
/// Returns [`TickError::ArithmeticOverflow`] if stock or the anchor would
/// overflow.
pub fn drift_market(
    market: &mut Market,
    now: DateTime<Utc>,
    drift_tick_seconds: u64,
) -> Result<u64, TickError> {
    let elapsed = elapsed_whole_secs(market.last_drift_tick, now);
    let Some(ticks) = elapsed.checked_div(drift_tick_seconds) else {
        return Ok(0);
    };
    if ticks == 0 {
        return Ok(0);
    }

    let mut stock = market.stock.clone();
    for (item, &rate) in &market.consumption {
        let drain = rate.saturating_mul(ticks);
        let entry = stock.entry(item.clone()).or_insert(0);
        *entry = entry.saturating_sub(drain);
    }
    for (item, &rate) in &market.production {
        let gain = rate.checked_mul(ticks).ok_or(TickError::ArithmeticOverflow)?;
        let entry = stock.entry(item.clone()).or_insert(0);
        *entry = entry.checked_add(gain).ok_or(TickError::ArithmeticOverflow)?;
    }

    let advance = ticks
        .checked_mul(drift_tick_seconds)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(TimeDelta::try_seconds)
        .ok_or(TickError::ArithmeticOverflow)?;
    market.last_drift_tick = market
        .last_drift_tick
        .checked_add_signed(advance)
        .ok_or(TickError::ArithmeticOverflow)?;
    market.stock = stock;

    debug!(market = %market.symbol, ticks, "market drifted");
    Ok(ticks)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use guild_types::{Archetype, Golem, ManaDetails, PricingInfo};
    use guild_world::starting_world;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000_i64.checked_add(secs).unwrap(), 0).unwrap()
    }

    fn golem(symbol: &str, archetype: Archetype, status: GolemStatus) -> Golem {
        Golem {
            symbol: symbol.to_owned(),
            archetype,
            location_symbol: "A-G".to_owned(),
            status,
            status_detail: None,
            arrival_time: None,
            capacity: 10,
        }
    }

    fn user() -> User {
        User {
            username: "ada".to_owned(),
            coins: 0,
            mana: ManaDetails {
                mana: 100.0,
                mana_cap: 21600.0,
                mana_regen: 1.0,
                last_mana_tick: at(0),
            },
            golems: BTreeMap::new(),
            inventories: BTreeMap::new(),
            last_harvest_tick: at(0),
            known_rituals: BTreeSet::new(),
            user_since: at(0),
        }
    }

    #[test]
    fn mana_regenerates_with_invoker_bonus() {
        let mut u = user();
        u.golems.insert(
            "INV-0".to_owned(),
            golem("INV-0", Archetype::Invoker, GolemStatus::Invoking),
        );
        u.golems.insert(
            "INV-1".to_owned(),
            golem("INV-1", Archetype::Invoker, GolemStatus::Idle),
        );

        let gained = regenerate_mana(&mut u, at(10), 0.5);
        assert!((gained - 15.0).abs() < 1e-9);
        assert!((u.mana.mana - 115.0).abs() < 1e-9);
        assert_eq!(u.mana.last_mana_tick, at(10));
    }

    #[test]
    fn mana_caps_and_still_advances_anchor() {
        let mut u = user();
        u.mana.mana = 21_590.0;
        regenerate_mana(&mut u, at(3600), 0.5);
        assert!((u.mana.mana - 21_600.0).abs() < f64::EPSILON);
        assert_eq!(u.mana.last_mana_tick, at(3600));
    }

    #[test]
    fn clock_skew_adds_nothing() {
        let mut u = user();
        u.mana.last_mana_tick = at(100);
        let gained = regenerate_mana(&mut u, at(50), 0.5);
        assert!(gained.abs() < f64::EPSILON);
        assert_eq!(u.mana.last_mana_tick, at(100));
    }

    #[test]
    fn arrivals_move_golems_to_destination() {
        let mut u = user();
        let mut traveler = golem("HAR-0", Archetype::Harvester, GolemStatus::Traveling);
        traveler.status_detail = Some("A-F".to_owned());
        traveler.arrival_time = Some(at(300));
        u.golems.insert("HAR-0".to_owned(), traveler.clone());
        let mut late = traveler;
        late.symbol = "HAR-1".to_owned();
        late.arrival_time = Some(at(301));
        u.golems.insert("HAR-1".to_owned(), late);

        let arrived = complete_arrivals(&mut u, at(300));
        assert_eq!(arrived, vec!["HAR-0".to_owned()]);

        let g = u.golems.get("HAR-0");
        assert_eq!(g.map(|g| g.location_symbol.as_str()), Some("A-F"));
        assert_eq!(g.map(|g| g.status), Some(GolemStatus::Idle));
        assert!(g.is_some_and(|g| g.status_detail.is_none() && g.arrival_time.is_none()));
        assert_eq!(
            u.golems.get("HAR-1").map(|g| g.status),
            Some(GolemStatus::Traveling)
        );
    }

    #[test]
    fn harvest_185_seconds_yields_three_cycles() {
        let world = starting_world().unwrap();
        let mut u = user();
        let mut harvester = golem("HAR-0", Archetype::Harvester, GolemStatus::Harvesting);
        harvester.status_detail = Some("A-G-WOODLOT".to_owned());
        u.golems.insert("HAR-0".to_owned(), harvester);
        let mut rng = SmallRng::seed_from_u64(42);

        let harvested = accrue_harvests(&mut u, at(185), &world, &mut rng).unwrap();
        assert_eq!(harvested.get("LOGS").copied(), Some(15));
        assert_eq!(inventory::held(&u.inventories, "A-G", "LOGS"), 15);
        assert_eq!(u.last_harvest_tick, at(185));
    }

    #[test]
    fn recompute_is_idempotent() {
        let world = starting_world().unwrap();
        let mut u = user();
        let mut harvester = golem("HAR-0", Archetype::Harvester, GolemStatus::Harvesting);
        harvester.status_detail = Some("A-M-QUARRY".to_owned());
        u.golems.insert("HAR-0".to_owned(), harvester);
        let mut rng = SmallRng::seed_from_u64(7);
        let config = ManaConfig::default();

        recompute_user(&mut u, at(1000), &world, &config, &mut rng).unwrap();
        let once = u.clone();
        let second = recompute_user(&mut u, at(1000), &world, &config, &mut rng).unwrap();
        assert_eq!(u, once);
        assert!(second.harvested.is_empty());
        assert!(second.arrivals.is_empty());
    }

    #[test]
    fn seeded_rolls_are_reproducible() {
        let world = starting_world().unwrap();
        let run = |seed| {
            let mut u = user();
            let mut harvester = golem("HAR-0", Archetype::Harvester, GolemStatus::Harvesting);
            harvester.status_detail = Some("A-F-GROVE".to_owned());
            u.golems.insert("HAR-0".to_owned(), harvester);
            let mut rng = SmallRng::seed_from_u64(seed);
            accrue_harvests(&mut u, at(120 * 40), &world, &mut rng).unwrap();
            u.inventories
        };
        let first = run(99);
        assert_eq!(first, run(99));
        // LOGS always drop: 40 cycles of 8.
        assert_eq!(inventory::held(&first, "A-G", "LOGS"), 320);
        assert!(inventory::held(&first, "A-G", "RESIN") <= 40);
    }

    #[test]
    fn unknown_node_is_skipped() {
        let world = starting_world().unwrap();
        let mut u = user();
        let mut harvester = golem("HAR-0", Archetype::Harvester, GolemStatus::Harvesting);
        harvester.status_detail = Some("NOWHERE".to_owned());
        u.golems.insert("HAR-0".to_owned(), harvester);
        let mut rng = SmallRng::seed_from_u64(1);

        let harvested = accrue_harvests(&mut u, at(600), &world, &mut rng).unwrap();
        assert!(harvested.is_empty());
        assert!(u.inventories.is_empty());
    }

    fn market() -> Market {
        Market {
            symbol: "A-G-MARKET".to_owned(),
            name: "Aldergate Market".to_owned(),
            pricing: BTreeMap::from([(
                "LOGS".to_owned(),
                PricingInfo {
                    min: 10,
                    max: 110,
                    sensitivity: 50,
                },
            )]),
            stock: BTreeMap::from([("LOGS".to_owned(), 20)]),
            consumption: BTreeMap::from([("LOGS".to_owned(), 6)]),
            production: BTreeMap::from([("LOGS".to_owned(), 2)]),
            last_drift_tick: at(0),
        }
    }

    #[test]
    fn drift_applies_whole_ticks_and_keeps_remainder() {
        let mut m = market();
        assert_eq!(drift_market(&mut m, at(650), 300), Ok(2));
        assert_eq!(m.stock_of("LOGS"), 20 - 12 + 4);
        assert_eq!(m.last_drift_tick, at(600));

        assert_eq!(drift_market(&mut m, at(899), 300), Ok(0));
        assert_eq!(m.stock_of("LOGS"), 12);
    }

    #[test]
    fn drift_consumption_floors_at_zero_before_production() {
        let mut m = market();
        assert_eq!(drift_market(&mut m, at(300 * 10), 300), Ok(10));
        assert_eq!(m.stock_of("LOGS"), 20);
    }

    #[test]
    fn zero_period_is_a_no_op() {
        let mut m = market();
        assert_eq!(drift_market(&mut m, at(10_000), 0), Ok(0));
        assert_eq!(m, market());
    }
}
