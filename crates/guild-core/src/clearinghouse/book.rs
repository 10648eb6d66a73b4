//! The order table: every spooled order, indexed by id and reference.
//!
//! The book owns order lifecycle state. Status changes go through
//! [`OrderBook::advance`], which refuses any move the lifecycle does not
//! permit, so an order can never step backwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use guild_types::{DeadLetterId, MarketOrder, Order, OrderId, OrderStatus};
use tracing::{debug, warn};

use super::reference::OrderReference;
use crate::error::GameError;

/// A settlement or reaping failure kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Unique id of this record.
    pub id: DeadLetterId,
    /// The order as it was when it failed.
    pub order: MarketOrder,
    /// What went wrong.
    pub reason: String,
    /// When the failure was recorded.
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BookState {
    orders: HashMap<OrderId, MarketOrder>,
    by_reference: HashMap<String, OrderId>,
    last_unix: i64,
    sequence: u32,
    dead_letters: VecDeque<DeadLetter>,
}

impl BookState {
    fn remove(&mut self, id: OrderId) -> Option<MarketOrder> {
        let order = self.orders.remove(&id)?;
        self.by_reference.remove(&order.reference);
        Some(order)
    }

    fn push_dead_letter(&mut self, letter: DeadLetter, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.dead_letters.len() >= capacity {
            self.dead_letters.pop_front();
        }
        self.dead_letters.push_back(letter);
    }
}

/// Shared order table. Share it with `Arc`.
#[derive(Debug)]
pub struct OrderBook {
    state: Mutex<BookState>,
    dead_letter_capacity: usize,
}

impl OrderBook {
    /// Create an empty book retaining at most `dead_letter_capacity` dead
    /// letters.
    pub fn new(dead_letter_capacity: usize) -> Self {
        Self {
            state: Mutex::new(BookState::default()),
            dead_letter_capacity,
        }
    }

    fn state(&self) -> MutexGuard<'_, BookState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `order` as `Spooled` and return its reference.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ArithmeticOverflow`] if the per-second sequence
    /// is exhausted.
    pub fn spool(
        &self,
        order: Order,
        username: &str,
        golem_symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<String, GameError> {
        let mut state = self.state();
        let unix = now.timestamp();
        if unix > state.last_unix {
            state.last_unix = unix;
            state.sequence = 0;
        }

        let reference = loop {
            let candidate =
                OrderReference::new(state.last_unix, state.sequence, username, golem_symbol, &order)
                    .to_string();
            state.sequence = state
                .sequence
                .checked_add(1)
                .ok_or(GameError::ArithmeticOverflow)?;
            if !state.by_reference.contains_key(&candidate) {
                break candidate;
            }
        };

        let id = OrderId::new();
        let market_order = MarketOrder {
            id,
            reference: reference.clone(),
            username: username.to_owned(),
            golem_symbol: golem_symbol.to_owned(),
            status: OrderStatus::Spooled,
            order,
            spooled_at: now,
            history: vec![OrderStatus::Spooled],
        };
        state.by_reference.insert(reference.clone(), id);
        state.orders.insert(id, market_order);
        debug!(reference = %reference, order_id = %id, "order spooled");
        Ok(reference)
    }

    /// Whether `reference` names an order still in `Spooled`.
    pub fn is_spooled(&self, reference: &str) -> bool {
        let state = self.state();
        state
            .by_reference
            .get(reference)
            .and_then(|id| state.orders.get(id))
            .is_some_and(|order| order.status == OrderStatus::Spooled)
    }

    /// Move a `Spooled` order to `Queued`, returning its id.
    pub fn mark_queued(&self, reference: &str) -> Option<OrderId> {
        let mut state = self.state();
        let id = *state.by_reference.get(reference)?;
        let order = state.orders.get_mut(&id)?;
        if order.status != OrderStatus::Spooled {
            return None;
        }
        order.status = OrderStatus::Queued;
        order.history.push(OrderStatus::Queued);
        debug!(reference, "order queued");
        Some(id)
    }

    /// Advance an order one lifecycle step, returning a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::OrderNotFound`] for an unknown id or
    /// [`GameError::Internal`] for a move the lifecycle forbids.
    pub fn advance(&self, id: OrderId, next: OrderStatus) -> Result<MarketOrder, GameError> {
        let mut state = self.state();
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| GameError::OrderNotFound(id.to_string()))?;
        if !order.status.can_advance_to(next) {
            return Err(GameError::Internal(format!(
                "order {} cannot move from {} to {next}",
                order.reference, order.status
            )));
        }
        order.status = next;
        order.history.push(next);
        debug!(reference = %order.reference, status = %next, "order status changed");
        Ok(order.clone())
    }

    /// Snapshot of an order by id.
    pub fn get(&self, id: OrderId) -> Option<MarketOrder> {
        self.state().orders.get(&id).cloned()
    }

    /// Snapshot of an order by reference.
    pub fn by_reference(&self, reference: &str) -> Option<MarketOrder> {
        let state = self.state();
        state
            .by_reference
            .get(reference)
            .and_then(|id| state.orders.get(id))
            .cloned()
    }

    /// A user's orders, oldest first, optionally filtered by status.
    pub fn orders_for_user(&self, username: &str, status: Option<OrderStatus>) -> Vec<MarketOrder> {
        let mut orders: Vec<MarketOrder> = self
            .state()
            .orders
            .values()
            .filter(|order| order.username == username)
            .filter(|order| status.is_none_or(|wanted| order.status == wanted))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            a.spooled_at
                .cmp(&b.spooled_at)
                .then_with(|| a.reference.cmp(&b.reference))
        });
        orders
    }

    /// Remove `Spooled` orders older than `ttl`, dead-lettering each, and
    /// prune terminal orders older than `ttl`. Returns the reaped orders.
    pub fn reap_abandoned(&self, now: DateTime<Utc>, ttl: TimeDelta) -> Vec<MarketOrder> {
        let mut state = self.state();
        let expired: Vec<(OrderId, OrderStatus)> = state
            .orders
            .values()
            .filter(|order| now.signed_duration_since(order.spooled_at) > ttl)
            .map(|order| (order.id, order.status))
            .collect();

        let mut reaped = Vec::new();
        for (id, status) in expired {
            if status == OrderStatus::Spooled {
                if let Some(order) = state.remove(id) {
                    warn!(reference = %order.reference, "abandoned order reaped");
                    let letter = DeadLetter {
                        id: DeadLetterId::new(),
                        order: order.clone(),
                        reason: "abandoned: never executed".to_owned(),
                        recorded_at: now,
                    };
                    state.push_dead_letter(letter, self.dead_letter_capacity);
                    reaped.push(order);
                }
            } else if status.is_terminal() {
                state.remove(id);
            }
        }
        reaped
    }

    /// Record a failure for `order`.
    pub fn record_dead_letter(&self, order: MarketOrder, reason: String, now: DateTime<Utc>) {
        let letter = DeadLetter {
            id: DeadLetterId::new(),
            order,
            reason,
            recorded_at: now,
        };
        self.state()
            .push_dead_letter(letter, self.dead_letter_capacity);
    }

    /// All retained dead letters, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state().dead_letters.iter().cloned().collect()
    }

    /// Number of orders in the table.
    pub fn len(&self) -> usize {
        self.state().orders.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.state().orders.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use guild_types::OrderType;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000_i64.checked_add(secs).unwrap(), 0).unwrap()
    }

    fn order() -> Order {
        Order {
            order_type: OrderType::Sell,
            market_symbol: "A-G-MARKET".to_owned(),
            item_symbol: "LOGS".to_owned(),
            quantity: 10,
            target_price: 20,
            force_execution: false,
        }
    }

    #[test]
    fn sequence_increments_within_a_second() {
        let book = OrderBook::new(8);
        let first = book.spool(order(), "ada", "MER-0", at(0)).unwrap();
        let second = book.spool(order(), "ada", "MER-1", at(0)).unwrap();
        let third = book.spool(order(), "ada", "MER-0", at(1)).unwrap();
        assert_eq!(first, "ORDER#1700000000+0|ada:MER-0|SELL10LOGS@20");
        assert!(second.starts_with("ORDER#1700000000+1|"));
        assert!(third.starts_with("ORDER#1700000001+0|"));
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn lifecycle_is_monotonic() {
        let book = OrderBook::new(8);
        let reference = book.spool(order(), "ada", "MER-0", at(0)).unwrap();
        assert!(book.is_spooled(&reference));
        let id = book.mark_queued(&reference).unwrap();
        assert!(book.mark_queued(&reference).is_none());
        assert!(!book.is_spooled(&reference));

        assert!(book.advance(id, OrderStatus::Spooled).is_err());
        assert!(book.advance(id, OrderStatus::Executed).is_err());
        book.advance(id, OrderStatus::InProcessing).unwrap();
        book.advance(id, OrderStatus::InExecuting).unwrap();
        assert!(book.advance(id, OrderStatus::InCancelling).is_err());
        book.advance(id, OrderStatus::Executed).unwrap();
        assert!(book.advance(id, OrderStatus::Queued).is_err());

        let settled = book.by_reference(&reference).unwrap();
        assert_eq!(settled.status, OrderStatus::Executed);
        assert_eq!(
            settled.history,
            vec![
                OrderStatus::Spooled,
                OrderStatus::Queued,
                OrderStatus::InProcessing,
                OrderStatus::InExecuting,
                OrderStatus::Executed,
            ]
        );
    }

    #[test]
    fn orders_filter_by_user_and_status() {
        let book = OrderBook::new(8);
        book.spool(order(), "ada", "MER-0", at(0)).unwrap();
        let queued = book.spool(order(), "ada", "MER-1", at(5)).unwrap();
        book.spool(order(), "bob", "MER-0", at(6)).unwrap();
        book.mark_queued(&queued).unwrap();

        assert_eq!(book.orders_for_user("ada", None).len(), 2);
        let spooled = book.orders_for_user("ada", Some(OrderStatus::Spooled));
        assert_eq!(spooled.len(), 1);
        assert_eq!(spooled.first().unwrap().golem_symbol, "MER-0");
        assert!(book.orders_for_user("cy", None).is_empty());
    }

    #[test]
    fn reaping_removes_only_stale_spooled_orders() {
        let book = OrderBook::new(8);
        let stale = book.spool(order(), "ada", "MER-0", at(0)).unwrap();
        let fresh = book.spool(order(), "ada", "MER-1", at(3000)).unwrap();
        let queued = book.spool(order(), "ada", "MER-2", at(0)).unwrap();
        book.mark_queued(&queued).unwrap();

        let reaped = book.reap_abandoned(at(3601), TimeDelta::try_seconds(3600).unwrap());
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped.first().unwrap().reference, stale);
        assert!(book.by_reference(&stale).is_none());
        assert!(book.is_spooled(&fresh));
        assert!(book.by_reference(&queued).is_some());
        assert_eq!(book.dead_letters().len(), 1);
    }

    #[test]
    fn reaping_prunes_settled_orders_silently() {
        let book = OrderBook::new(8);
        let reference = book.spool(order(), "ada", "MER-0", at(0)).unwrap();
        let id = book.mark_queued(&reference).unwrap();
        book.advance(id, OrderStatus::InProcessing).unwrap();
        book.advance(id, OrderStatus::InCancelling).unwrap();
        book.advance(id, OrderStatus::Cancelled).unwrap();

        let reaped = book.reap_abandoned(at(3601), TimeDelta::try_seconds(3600).unwrap());
        assert!(reaped.is_empty());
        assert!(book.is_empty());
        assert!(book.dead_letters().is_empty());
    }

    #[test]
    fn dead_letters_are_bounded() {
        let book = OrderBook::new(2);
        for n in 0..3 {
            let reference = book.spool(order(), "ada", "MER-0", at(n)).unwrap();
            let snapshot = book.by_reference(&reference).unwrap();
            book.record_dead_letter(snapshot, format!("failure {n}"), at(n));
        }
        let reasons: Vec<String> = book.dead_letters().into_iter().map(|d| d.reason).collect();
        assert_eq!(reasons, vec!["failure 1".to_owned(), "failure 2".to_owned()]);
    }
}
