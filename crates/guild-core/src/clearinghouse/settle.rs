//! Settlement of a single order.
//!
//! Settlement runs only on the clearinghouse worker, one order at a time,
//! under the owner's commit gate. Everything a settlement will write is
//! computed before the first write is issued. Writes then go out as
//! targeted sub-path updates in a fixed order with the golem last:
//!
//! 1. the golem's inventory (or its removal when emptied)
//! 2. the owner's coins
//! 3. the market entry
//! 4. the golem, reset to idle
//!
//! A failure before the first write cancels the order and leaves a dead
//! letter. A write failure after the order reached `InExecuting` leaves a
//! dead letter and the order in `InExecuting`, since some writes may
//! already be visible.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use guild_db::{DocumentStore, MarketRepository, UserRepository};
use guild_types::{Golem, GolemStatus, Market, MarketOrder, OrderId, OrderStatus, User};
use tracing::{error, info, warn};

use super::book::OrderBook;
use crate::error::GameError;
use crate::inventory;
use crate::lock::CommitGates;
use crate::pricing::market_price;
use crate::tick::drift_market;

/// Shared state the worker needs to settle orders.
#[derive(Debug)]
pub struct ClearinghouseDeps<S> {
    /// User records.
    pub users: UserRepository<S>,
    /// Market records.
    pub markets: MarketRepository<S>,
    /// The order table.
    pub book: Arc<OrderBook>,
    /// Per-user commit gates shared with request handlers.
    pub gates: Arc<CommitGates>,
    /// Seconds per market drift tick.
    pub drift_tick_seconds: u64,
}

/// How one settlement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Effects applied; the order is `Executed`.
    Executed {
        /// Unit price paid.
        price: u64,
        /// Coins credited.
        proceeds: u64,
    },
    /// Spot price was below target; the order is `Cancelled`.
    Cancelled {
        /// Spot price at settlement.
        price: u64,
    },
    /// Settlement failed. A dead letter is recorded for every order the
    /// book still knows.
    Failed,
}

enum Plan {
    BelowTarget {
        golem: Golem,
        price: u64,
    },
    Execute {
        user: Box<User>,
        market: Box<Market>,
        price: u64,
        proceeds: u64,
    },
}

/// Settle the order with `id`.
pub async fn settle<S: DocumentStore>(deps: &ClearinghouseDeps<S>, id: OrderId) -> Outcome {
    let now = Utc::now();
    let order = match deps.book.advance(id, OrderStatus::InProcessing) {
        Ok(order) => order,
        Err(err) => {
            error!(order_id = %id, error = %err, "dequeued order cannot be processed");
            return Outcome::Failed;
        }
    };

    let _gate = deps.gates.lock(&order.username).await;
    match plan(deps, &order, now).await {
        Ok(Plan::BelowTarget { golem, price }) => {
            cancel_below_target(deps, &order, &golem, price, now).await
        }
        Ok(Plan::Execute {
            user,
            market,
            price,
            proceeds,
        }) => execute(deps, &order, &user, &market, price, proceeds, now).await,
        Err(err) => {
            warn!(reference = %order.reference, error = %err, "settlement failed, cancelling");
            cancel_failed(deps, &order, &err, now).await;
            Outcome::Failed
        }
    }
}

async fn plan<S: DocumentStore>(
    deps: &ClearinghouseDeps<S>,
    order: &MarketOrder,
    now: DateTime<Utc>,
) -> Result<Plan, GameError> {
    let trade = &order.order;
    let user = deps
        .users
        .load(&order.username)
        .await?
        .ok_or_else(|| GameError::UserNotFound(order.username.clone()))?;
    let mut market = deps
        .markets
        .load(&trade.market_symbol)
        .await?
        .ok_or_else(|| GameError::SettlementFailed {
            reference: order.reference.clone(),
            reason: format!("market {} no longer exists", trade.market_symbol),
        })?;
    drift_market(&mut market, now, deps.drift_tick_seconds)?;

    let price = market_price(&market, &trade.item_symbol)?.ok_or_else(|| {
        GameError::ItemNotTraded {
            item: trade.item_symbol.clone(),
            market: trade.market_symbol.clone(),
        }
    })?;
    let mut golem = user
        .golems
        .get(&order.golem_symbol)
        .cloned()
        .ok_or_else(|| GameError::GolemNotFound {
            username: order.username.clone(),
            golem: order.golem_symbol.clone(),
        })?;
    if !is_transacting(&golem, order) {
        return Err(GameError::SettlementFailed {
            reference: order.reference.clone(),
            reason: format!(
                "golem {} is {} and not transacting this order",
                order.golem_symbol, golem.status
            ),
        });
    }

    if !trade.force_execution && price < trade.target_price {
        golem.reset_to_idle();
        return Ok(Plan::BelowTarget { golem, price });
    }

    let mut after = user;
    inventory::withdraw(
        &mut after.inventories,
        &order.golem_symbol,
        &trade.item_symbol,
        trade.quantity,
    )?;
    let proceeds = trade
        .quantity
        .checked_mul(price)
        .ok_or(GameError::ArithmeticOverflow)?;
    after.coins = after
        .coins
        .checked_add(proceeds)
        .ok_or(GameError::ArithmeticOverflow)?;
    let stock = market
        .stock_of(&trade.item_symbol)
        .checked_add(trade.quantity)
        .ok_or(GameError::ArithmeticOverflow)?;
    market.stock.insert(trade.item_symbol.clone(), stock);
    if let Some(golem) = after.golems.get_mut(&order.golem_symbol) {
        golem.reset_to_idle();
    }

    Ok(Plan::Execute {
        user: Box::new(after),
        market: Box::new(market),
        price,
        proceeds,
    })
}

async fn cancel_below_target<S: DocumentStore>(
    deps: &ClearinghouseDeps<S>,
    order: &MarketOrder,
    golem: &Golem,
    price: u64,
    now: DateTime<Utc>,
) -> Outcome {
    if let Err(err) = deps.book.advance(order.id, OrderStatus::InCancelling) {
        error!(reference = %order.reference, error = %err, "cannot cancel order");
        return Outcome::Failed;
    }
    if let Err(err) = deps.users.set_golem(&order.username, golem).await {
        warn!(reference = %order.reference, error = %err, "failed to reset golem after cancel");
        deps.book
            .record_dead_letter(order.clone(), format!("golem reset failed: {err}"), now);
    }
    if let Err(err) = deps.book.advance(order.id, OrderStatus::Cancelled) {
        error!(reference = %order.reference, error = %err, "cannot finish cancelling order");
        return Outcome::Failed;
    }
    info!(
        reference = %order.reference,
        price,
        target = order.order.target_price,
        "order cancelled below target"
    );
    Outcome::Cancelled { price }
}

async fn execute<S: DocumentStore>(
    deps: &ClearinghouseDeps<S>,
    order: &MarketOrder,
    user: &User,
    market: &Market,
    price: u64,
    proceeds: u64,
    now: DateTime<Utc>,
) -> Outcome {
    if let Err(err) = deps.book.advance(order.id, OrderStatus::InExecuting) {
        error!(reference = %order.reference, error = %err, "cannot execute order");
        return Outcome::Failed;
    }

    if let Err(err) = write_effects(deps, order, user, market).await {
        error!(
            reference = %order.reference,
            error = %err,
            "settlement writes failed; order left in InExecuting"
        );
        deps.book
            .record_dead_letter(order.clone(), format!("settlement writes failed: {err}"), now);
        reset_golem_best_effort(&deps.users, order).await;
        return Outcome::Failed;
    }

    if let Err(err) = deps.book.advance(order.id, OrderStatus::Executed) {
        error!(reference = %order.reference, error = %err, "cannot finish executing order");
        return Outcome::Failed;
    }
    info!(
        reference = %order.reference,
        price,
        proceeds,
        quantity = order.order.quantity,
        "order executed"
    );
    Outcome::Executed { price, proceeds }
}

async fn write_effects<S: DocumentStore>(
    deps: &ClearinghouseDeps<S>,
    order: &MarketOrder,
    user: &User,
    market: &Market,
) -> Result<(), GameError> {
    let username = &order.username;
    let golem_symbol = &order.golem_symbol;

    match user.inventories.get(golem_symbol) {
        Some(cargo) => {
            deps.users
                .set_inventory(username, golem_symbol, cargo)
                .await?;
        }
        None => {
            deps.users.delete_inventory(username, golem_symbol).await?;
        }
    }
    deps.users.set_coins(username, user.coins).await?;
    deps.markets.save(market).await?;
    let golem = user
        .golems
        .get(golem_symbol)
        .ok_or_else(|| GameError::GolemNotFound {
            username: username.clone(),
            golem: golem_symbol.clone(),
        })?;
    deps.users.set_golem(username, golem).await?;
    Ok(())
}

async fn cancel_failed<S: DocumentStore>(
    deps: &ClearinghouseDeps<S>,
    order: &MarketOrder,
    err: &GameError,
    now: DateTime<Utc>,
) {
    if let Err(advance) = deps.book.advance(order.id, OrderStatus::InCancelling) {
        error!(reference = %order.reference, error = %advance, "cannot cancel failed order");
    }
    reset_golem_best_effort(&deps.users, order).await;
    if let Err(advance) = deps.book.advance(order.id, OrderStatus::Cancelled) {
        error!(
            reference = %order.reference,
            error = %advance,
            "cannot finish cancelling failed order"
        );
    }
    deps.book.record_dead_letter(
        deps.book.get(order.id).unwrap_or_else(|| order.clone()),
        err.to_string(),
        now,
    );
}

/// Reset the order's golem to idle if it still exists and is still
/// transacting this order. Failures are logged, never returned.
pub async fn reset_golem_best_effort<S: DocumentStore>(
    users: &UserRepository<S>,
    order: &MarketOrder,
) {
    let user = match users.load(&order.username).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(err) => {
            warn!(reference = %order.reference, error = %err, "cannot load owner to reset golem");
            return;
        }
    };
    let Some(mut golem) = user.golems.get(&order.golem_symbol).cloned() else {
        return;
    };
    if !is_transacting(&golem, order) {
        return;
    }
    golem.reset_to_idle();
    if let Err(err) = users.set_golem(&order.username, &golem).await {
        warn!(reference = %order.reference, error = %err, "failed to reset golem");
    }
}

/// Whether `golem` is transacting `order` and nothing else.
pub fn is_transacting(golem: &Golem, order: &MarketOrder) -> bool {
    golem.status == GolemStatus::Transacting
        && golem.status_detail.as_deref() == Some(order.reference.as_str())
}
