//! The game service: every operation a client can invoke.
//!
//! Each user-facing operation follows the same shape:
//!
//! 1. take the golem edit lock (status changes only)
//! 2. reserve a clearinghouse queue slot (`transacting` only)
//! 3. take the owner's commit gate
//! 4. load the user and recompute it up to `now`
//! 5. apply the request to a working copy
//! 6. commit the difference as targeted sub-path writes
//!
//! Recomputation is committed even when the request itself fails, so the
//! stored record never falls behind the time at which it was last read.
//! The request's own changes are committed only on success.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use guild_db::{DocumentStore, MarketRepository, UserRepository};
use guild_types::{Golem, GolemStatus, MarketOrder, Order, OrderStatus, User};
use guild_world::WorldCatalog;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clearinghouse::settle::{is_transacting, reset_golem_best_effort};
use crate::clearinghouse::{
    ClearinghouseDeps, ClearinghouseHandle, DeadLetter, OrderBook, OrderQueue, spawn,
};
use crate::config::GameConfig;
use crate::error::GameError;
use crate::lock::{CommitGates, GolemLocks};
use crate::pricing::market_price;
use crate::rituals::{self, starting_user};
use crate::status::{StatusRules, check_transition};
use crate::tick::{RecomputeSummary, drift_market, recompute_user};
use crate::transition::{self, TransitionPlan, begin_transacting};

/// A price quote for one item on one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarketQuote {
    /// The market quoted.
    pub market_symbol: String,
    /// The item quoted.
    pub item_symbol: String,
    /// Stock after drift up to the quote time.
    pub stock: u64,
    /// Spot unit price at that stock.
    pub price: u64,
}

/// Entry point for all game operations. Cheap to clone.
pub struct GameService<S, W> {
    config: Arc<GameConfig>,
    rules: Arc<StatusRules>,
    world: Arc<W>,
    users: UserRepository<S>,
    markets: MarketRepository<S>,
    locks: Arc<GolemLocks>,
    gates: Arc<CommitGates>,
    book: Arc<OrderBook>,
    queue: OrderQueue,
}

impl<S, W> Clone for GameService<S, W> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            rules: Arc::clone(&self.rules),
            world: Arc::clone(&self.world),
            users: self.users.clone(),
            markets: self.markets.clone(),
            locks: Arc::clone(&self.locks),
            gates: Arc::clone(&self.gates),
            book: Arc::clone(&self.book),
            queue: self.queue.clone(),
        }
    }
}

impl<S: DocumentStore, W: WorldCatalog + 'static> GameService<S, W> {
    /// Build the service and spawn its clearinghouse worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: GameConfig, world: Arc<W>, store: Arc<S>) -> (Self, ClearinghouseHandle) {
        let rules = Arc::new(StatusRules::from_config(&config.archetypes));
        let users = UserRepository::new(Arc::clone(&store));
        let markets = MarketRepository::new(store);
        let gates = Arc::new(CommitGates::new());
        let book = Arc::new(OrderBook::new(config.clearinghouse.dead_letter_capacity));

        let handle = spawn(
            ClearinghouseDeps {
                users: users.clone(),
                markets: markets.clone(),
                book: Arc::clone(&book),
                gates: Arc::clone(&gates),
                drift_tick_seconds: config.market.drift_tick_seconds,
            },
            config.clearinghouse.queue_capacity,
        );

        let service = Self {
            config: Arc::new(config),
            rules,
            world,
            users,
            markets,
            locks: Arc::new(GolemLocks::new()),
            gates,
            book,
            queue: handle.queue(),
        };
        (service, handle)
    }

    /// The loaded configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The archetype rules table.
    pub fn rules(&self) -> &StatusRules {
        &self.rules
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Create a new user with the configured starting values.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidPayload`] for an unusable name or
    /// [`GameError::UserAlreadyExists`].
    pub async fn register_user(&self, username: &str, now: DateTime<Utc>) -> Result<User, GameError> {
        if username.trim().is_empty() || username.contains([':', '|']) {
            return Err(GameError::InvalidPayload(format!(
                "username {username:?} must be non-empty and contain no ':' or '|'"
            )));
        }

        let _gate = self.gates.lock(username).await;
        if self.users.exists(username).await? {
            return Err(GameError::UserAlreadyExists(username.to_owned()));
        }
        let user = starting_user(username, now, &self.config);
        self.users.create(&user).await?;
        info!(username, "user registered");
        Ok(user)
    }

    /// Load a user brought up to `now`, committing the recomputation.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UserNotFound`] or a store error.
    pub async fn load_user(&self, username: &str, now: DateTime<Utc>) -> Result<User, GameError> {
        let _gate = self.gates.lock(username).await;
        let (stored, current) = self.load_recomputed(username, now).await?;
        self.users.commit(&stored, &current).await?;
        Ok(current)
    }

    async fn load_recomputed(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<(User, User), GameError> {
        let stored = self
            .users
            .load(username)
            .await?
            .ok_or_else(|| GameError::UserNotFound(username.to_owned()))?;
        let mut current = stored.clone();
        let summary = self.recompute(&mut current, now)?;
        if !summary.arrivals.is_empty() || !summary.harvested.is_empty() {
            debug!(
                username,
                arrivals = ?summary.arrivals,
                harvested = ?summary.harvested,
                "user recomputed"
            );
        }
        Ok((stored, current))
    }

    fn recompute(&self, user: &mut User, now: DateTime<Utc>) -> Result<RecomputeSummary, GameError> {
        let mut rng = rand::rng();
        Ok(recompute_user(
            user,
            now,
            self.world.as_ref(),
            &self.config.mana,
            &mut rng,
        )?)
    }

    // -----------------------------------------------------------------------
    // Golems
    // -----------------------------------------------------------------------

    /// Change a golem's status, returning the golem as committed.
    ///
    /// A `transacting` request first waits for a clearinghouse queue slot.
    /// It then spools its order, commits the golem as transacting and hands
    /// the order over before returning. Settlement happens later on the
    /// worker.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::GolemLockedForEditing`] when another request
    /// holds the golem. A `transacting` request returns
    /// [`GameError::Internal`] without touching the user once the
    /// clearinghouse has shut down. Otherwise returns any validation error
    /// from the status checks and handlers.
    pub async fn request_golem_status_change(
        &self,
        username: &str,
        golem: &str,
        new_status: &str,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Result<Golem, GameError> {
        let lock = self.locks.try_acquire(username, golem)?;

        // The worker takes the commit gate while settling, so the queue slot
        // is reserved before the gate.
        let permit = if new_status
            .parse::<GolemStatus>()
            .is_ok_and(|status| status == GolemStatus::Transacting)
        {
            Some(self.queue.reserve().await?)
        } else {
            None
        };

        let (committed, reference) = {
            let _gate = self.gates.lock(username).await;
            let (stored, current) = self.load_recomputed(username, now).await?;

            match self.transition(&current, golem, new_status, payload, now).await {
                Ok((after, reference)) => {
                    self.users.commit(&stored, &after).await?;
                    let committed = after.golems.get(golem).cloned().ok_or_else(|| {
                        GameError::Internal(format!("golem {golem} vanished during transition"))
                    })?;
                    (committed, reference)
                }
                Err(err) => {
                    self.users.commit(&stored, &current).await?;
                    debug!(username, golem, error = %err, "status change rejected");
                    return Err(err);
                }
            }
        };

        if let (Some(reference), Some(permit)) = (reference, permit) {
            match self.book.mark_queued(&reference) {
                Some(id) => {
                    permit.send(id);
                    debug!(reference = %reference, order_id = %id, "order handed to clearinghouse");
                }
                None => warn!(reference = %reference, "spooled order was not admitted"),
            }
        }

        lock.release();
        Ok(committed)
    }

    async fn transition(
        &self,
        current: &User,
        golem: &str,
        new_status: &str,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Result<(User, Option<String>), GameError> {
        let existing = current
            .golems
            .get(golem)
            .ok_or_else(|| GameError::GolemNotFound {
                username: current.username.clone(),
                golem: golem.to_owned(),
            })?;
        let status = check_transition(&self.rules, existing, new_status)?;
        let locale = existing.location_symbol.clone();

        let mut working = current.clone();
        let plan = transition::apply(
            &mut working,
            golem,
            status,
            payload,
            self.world.as_ref(),
            &self.rules,
            now,
        )?;

        match plan {
            TransitionPlan::Completed => Ok((working, None)),
            TransitionPlan::Transact(order) => {
                let market = self
                    .markets
                    .load(&order.market_symbol)
                    .await?
                    .ok_or_else(|| GameError::MarketUnavailable {
                        market: order.market_symbol.clone(),
                        locale,
                    })?;
                if !market.pricing.contains_key(&order.item_symbol) {
                    return Err(GameError::ItemNotTraded {
                        item: order.item_symbol,
                        market: order.market_symbol,
                    });
                }
                let reference = self.book.spool(order, &working.username, golem, now)?;
                begin_transacting(&mut working, golem, &reference)?;
                info!(username = %working.username, golem, reference = %reference, "golem transacting");
                Ok((working, Some(reference)))
            }
        }
    }

    /// Perform a summoning ritual, returning the new golem.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NoSuchRitual`], [`GameError::RitualNotKnown`],
    /// [`GameError::InsufficientMana`] or [`GameError::UserNotFound`].
    pub async fn perform_ritual(
        &self,
        username: &str,
        ritual: &str,
        now: DateTime<Utc>,
    ) -> Result<Golem, GameError> {
        let _gate = self.gates.lock(username).await;
        let (stored, current) = self.load_recomputed(username, now).await?;

        let mut working = current.clone();
        match rituals::perform_ritual(&mut working, ritual, &self.config, &self.rules) {
            Ok(golem) => {
                self.users.commit(&stored, &working).await?;
                info!(username, ritual, golem = %golem.symbol, "ritual performed");
                Ok(golem)
            }
            Err(err) => {
                self.users.commit(&stored, &current).await?;
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Spool an order without touching the golem. Returns the reference.
    ///
    /// The order can only be executed while its golem is transacting it;
    /// otherwise it waits in the spool until reaped.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidPayload`] for a zero quantity.
    pub fn spool_order(
        &self,
        order: Order,
        username: &str,
        golem: &str,
        now: DateTime<Utc>,
    ) -> Result<String, GameError> {
        if order.quantity == 0 {
            return Err(GameError::InvalidPayload(
                "order quantity must be positive".to_owned(),
            ));
        }
        self.book.spool(order, username, golem, now)
    }

    /// Hand a spooled order to the clearinghouse.
    ///
    /// Returns `false` without changing anything when the reference is
    /// unknown, the order has already left `Spooled`, or its golem is not
    /// transacting it. Waits for a free queue slot otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Internal`] once the clearinghouse has shut down,
    /// or a store error if the owner cannot be read.
    pub async fn execute_order(&self, reference: &str) -> Result<bool, GameError> {
        if !self.book.is_spooled(reference) {
            return Ok(false);
        }
        let Some(order) = self.book.by_reference(reference) else {
            return Ok(false);
        };
        if !self.golem_is_transacting(&order).await? {
            debug!(
                reference,
                golem = %order.golem_symbol,
                "golem is not transacting this order, not executing"
            );
            return Ok(false);
        }
        let permit = self.queue.reserve().await?;
        let Some(id) = self.book.mark_queued(reference) else {
            return Ok(false);
        };
        permit.send(id);
        debug!(reference, order_id = %id, "order handed to clearinghouse");
        Ok(true)
    }

    async fn golem_is_transacting(&self, order: &MarketOrder) -> Result<bool, GameError> {
        let owner = self.users.load(&order.username).await?;
        Ok(owner
            .as_ref()
            .and_then(|user| user.golems.get(&order.golem_symbol))
            .is_some_and(|golem| is_transacting(golem, order)))
    }

    /// A user's orders, oldest first, optionally filtered by status.
    pub fn orders_for_user(&self, username: &str, status: Option<OrderStatus>) -> Vec<MarketOrder> {
        self.book.orders_for_user(username, status)
    }

    /// Look up an order by its reference.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::OrderNotFound`].
    pub fn order_by_reference(&self, reference: &str) -> Result<MarketOrder, GameError> {
        self.book
            .by_reference(reference)
            .ok_or_else(|| GameError::OrderNotFound(reference.to_owned()))
    }

    /// Quote the spot price of `item` on `market` at `now`.
    ///
    /// Drift is applied to the quote but not persisted.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MarketUnavailable`] for an unknown market or
    /// [`GameError::ItemNotTraded`].
    pub async fn market_quote(
        &self,
        market: &str,
        item: &str,
        now: DateTime<Utc>,
    ) -> Result<MarketQuote, GameError> {
        let mut record = self
            .markets
            .load(market)
            .await?
            .ok_or_else(|| GameError::MarketUnavailable {
                market: market.to_owned(),
                locale: "any locale".to_owned(),
            })?;
        drift_market(&mut record, now, self.config.market.drift_tick_seconds)?;
        let price = market_price(&record, item)?.ok_or_else(|| GameError::ItemNotTraded {
            item: item.to_owned(),
            market: market.to_owned(),
        })?;
        Ok(MarketQuote {
            market_symbol: record.symbol.clone(),
            item_symbol: item.to_owned(),
            stock: record.stock_of(item),
            price,
        })
    }

    /// Remove orders spooled longer than the configured TTL and never
    /// executed. Golems still transacting such an order return to idle.
    /// Returns how many orders were reaped.
    pub async fn reap_abandoned_orders(&self, now: DateTime<Utc>) -> usize {
        let secs = self.config.clearinghouse.abandoned_order_ttl_seconds;
        let Some(ttl) = i64::try_from(secs).ok().and_then(TimeDelta::try_seconds) else {
            warn!(secs, "abandoned order TTL out of range, not reaping");
            return 0;
        };

        let reaped = self.book.reap_abandoned(now, ttl);
        for order in &reaped {
            let _gate = self.gates.lock(&order.username).await;
            reset_golem_best_effort(&self.users, order).await;
        }
        if !reaped.is_empty() {
            info!(count = reaped.len(), "abandoned orders reaped");
        }
        reaped.len()
    }

    /// Retained settlement and reaping failures, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.book.dead_letters()
    }
}
