//! End-to-end tests for `GameService` over the in-memory store.
//!
//! Each test builds a fresh service on the built-in starting world with
//! the starting markets seeded, then drives it through the public API the
//! way a client would.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use guild_core::{ClearinghouseHandle, GameConfig, GameError, GameService};
use guild_db::{MarketRepository, MemoryStore};
use guild_types::{GolemStatus, MarketOrder, Order, OrderStatus, OrderType};
use guild_world::{STARTING_MARKET, StaticWorld, starting_markets, starting_world};
use serde_json::{Value, json};

type Service = GameService<MemoryStore, StaticWorld>;

async fn start() -> (Service, ClearinghouseHandle, DateTime<Utc>) {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    MarketRepository::new(Arc::clone(&store))
        .seed_if_absent(&starting_markets(now))
        .await
        .expect("seed markets");
    let world = Arc::new(starting_world().expect("starting world"));
    let (service, handle) = GameService::start(GameConfig::default(), world, store);
    (service, handle, now)
}

fn after(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    now + TimeDelta::try_seconds(secs).expect("delta")
}

fn sell(quantity: u64, target_price: u64, forced: bool) -> Value {
    json!({"order": {
        "order-type": "SELL",
        "market-symbol": STARTING_MARKET,
        "item-symbol": "LOGS",
        "quantity": quantity,
        "target-price": target_price,
        "force-execution": forced,
    }})
}

/// Register `ada`, summon a merchant and pack 20 LOGS onto it.
async fn loaded_merchant(service: &Service, now: DateTime<Utc>) {
    service.register_user("ada", now).await.expect("register");
    let golem = service
        .perform_ritual("ada", "summon-merchant", now)
        .await
        .expect("summon");
    assert_eq!(golem.symbol, "MER-0");
    service
        .request_golem_status_change("ada", "MER-0", "packing", &json!({"manifest": {"LOGS": 20}}), now)
        .await
        .expect("pack");
}

async fn settled(service: &Service, reference: &str) -> MarketOrder {
    for _ in 0..400 {
        let order = service.order_by_reference(reference).expect("order exists");
        if order.status.is_terminal() {
            return order;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("order {reference} never settled");
}

#[tokio::test]
async fn sell_above_target_executes() {
    let (service, handle, now) = start().await;
    loaded_merchant(&service, now).await;

    let quote = service.market_quote(STARTING_MARKET, "LOGS", now).await.expect("quote");
    assert_eq!((quote.stock, quote.price), (50, 60));

    let golem = service
        .request_golem_status_change("ada", "MER-0", "transacting", &sell(20, 40, false), now)
        .await
        .expect("transact");
    assert_eq!(golem.status, GolemStatus::Transacting);
    let reference = golem.status_detail.expect("reference");
    assert!(reference.ends_with("|ada:MER-0|SELL20LOGS@40"));

    let order = settled(&service, &reference).await;
    assert_eq!(order.status, OrderStatus::Executed);
    assert_eq!(
        order.history,
        vec![
            OrderStatus::Spooled,
            OrderStatus::Queued,
            OrderStatus::InProcessing,
            OrderStatus::InExecuting,
            OrderStatus::Executed,
        ]
    );

    let user = service.load_user("ada", now).await.expect("load");
    assert_eq!(user.coins, 20 * 60);
    assert!(!user.inventories.contains_key("MER-0"));
    let golem = &user.golems["MER-0"];
    assert_eq!(golem.status, GolemStatus::Idle);
    assert!(golem.status_detail.is_none());

    let quote = service.market_quote(STARTING_MARKET, "LOGS", now).await.expect("quote");
    assert_eq!(quote.stock, 70);

    let report = handle.shutdown().await.expect("shutdown");
    assert_eq!(report.executed, 1);
    assert_eq!(report.cancelled, 0);
}

#[tokio::test]
async fn sell_below_target_cancels_without_effects() {
    let (service, handle, now) = start().await;
    loaded_merchant(&service, now).await;

    let golem = service
        .request_golem_status_change("ada", "MER-0", "transacting", &sell(20, 1000, false), now)
        .await
        .expect("transact");
    let reference = golem.status_detail.expect("reference");
    let order = settled(&service, &reference).await;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(
        order.history,
        vec![
            OrderStatus::Spooled,
            OrderStatus::Queued,
            OrderStatus::InProcessing,
            OrderStatus::InCancelling,
            OrderStatus::Cancelled,
        ]
    );
    assert!(service.dead_letters().is_empty());

    let user = service.load_user("ada", now).await.expect("load");
    assert_eq!(user.coins, 0);
    assert_eq!(user.inventories["MER-0"].quantity("LOGS"), 20);
    assert_eq!(user.golems["MER-0"].status, GolemStatus::Idle);
    let quote = service.market_quote(STARTING_MARKET, "LOGS", now).await.expect("quote");
    assert_eq!(quote.stock, 50);

    let report = handle.shutdown().await.expect("shutdown");
    assert_eq!(report.cancelled, 1);
}

#[tokio::test]
async fn forced_sell_ignores_target() {
    let (service, handle, now) = start().await;
    loaded_merchant(&service, now).await;

    let golem = service
        .request_golem_status_change("ada", "MER-0", "transacting", &sell(10, 1000, true), now)
        .await
        .expect("transact");
    let reference = golem.status_detail.expect("reference");
    assert!(reference.ends_with('*'));
    assert_eq!(settled(&service, &reference).await.status, OrderStatus::Executed);

    let user = service.load_user("ada", now).await.expect("load");
    assert_eq!(user.coins, 10 * 60);
    assert_eq!(user.inventories["MER-0"].quantity("LOGS"), 10);
    drop(handle.shutdown().await);
}

#[tokio::test]
async fn transacting_after_shutdown_leaves_golem_untouched() {
    let (service, handle, now) = start().await;
    loaded_merchant(&service, now).await;
    let before = service.load_user("ada", now).await.expect("load");

    handle.shutdown().await.expect("shutdown");
    let result = service
        .request_golem_status_change("ada", "MER-0", "transacting", &sell(5, 1, false), now)
        .await;
    assert!(matches!(result, Err(GameError::Internal(_))));

    let user = service.load_user("ada", now).await.expect("load");
    assert_eq!(user.golems["MER-0"], before.golems["MER-0"]);
    assert_eq!(user.inventories["MER-0"].quantity("LOGS"), 20);
    assert!(service.orders_for_user("ada", None).is_empty());

    // The golem is free for requests that do not need the clearinghouse.
    let golem = service
        .request_golem_status_change("ada", "MER-0", "idle", &json!({}), now)
        .await
        .expect("idle");
    assert_eq!(golem.status, GolemStatus::Idle);
}

fn standalone_sell(quantity: u64, target_price: u64) -> Order {
    Order {
        order_type: OrderType::Sell,
        market_symbol: STARTING_MARKET.to_owned(),
        item_symbol: "LOGS".to_owned(),
        quantity,
        target_price,
        force_execution: false,
    }
}

#[tokio::test]
async fn spooled_order_cannot_move_a_traveling_golem() {
    let (service, handle, now) = start().await;
    service.register_user("ada", now).await.expect("register");
    service
        .perform_ritual("ada", "summon-courier", now)
        .await
        .expect("summon");
    service
        .request_golem_status_change("ada", "COU-0", "traveling", &json!({"route": "A-G|A-F"}), now)
        .await
        .expect("travel");

    let reference = service
        .spool_order(standalone_sell(1, 1_000_000), "ada", "COU-0", now)
        .expect("spool");
    assert!(!service.execute_order(&reference).await.expect("execute"));
    assert_eq!(
        service.order_by_reference(&reference).expect("order").status,
        OrderStatus::Spooled
    );

    let user = service.load_user("ada", after(now, 10)).await.expect("load");
    let golem = &user.golems["COU-0"];
    assert_eq!(golem.status, GolemStatus::Traveling);
    assert_eq!(golem.location_symbol, "A-G");
    assert_eq!(golem.arrival_time, Some(after(now, 225)));

    let user = service.load_user("ada", after(now, 225)).await.expect("load");
    assert_eq!(user.golems["COU-0"].location_symbol, "A-F");
    assert_eq!(user.golems["COU-0"].status, GolemStatus::Idle);

    let report = handle.shutdown().await.expect("shutdown");
    assert_eq!(report, guild_core::WorkerReport::default());
}

#[tokio::test]
async fn standalone_spooled_order_is_reaped() {
    let (service, handle, now) = start().await;
    loaded_merchant(&service, now).await;
    let before = service.load_user("ada", now).await.expect("load");

    let reference = service
        .spool_order(standalone_sell(5, 1), "ada", "MER-0", now)
        .expect("spool");
    assert!(!service.execute_order(&reference).await.expect("execute"));
    assert_eq!(service.orders_for_user("ada", Some(OrderStatus::Spooled)).len(), 1);

    assert_eq!(service.reap_abandoned_orders(after(now, 60)).await, 0);
    assert_eq!(service.reap_abandoned_orders(after(now, 3601)).await, 1);
    assert!(service.orders_for_user("ada", None).is_empty());
    let letters = service.dead_letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].order.reference, reference);

    let user = service.load_user("ada", after(now, 3601)).await.expect("load");
    assert_eq!(user.golems["MER-0"], before.golems["MER-0"]);
    assert_eq!(user.inventories["MER-0"].quantity("LOGS"), 20);
    assert_eq!(user.coins, 0);
    drop(handle.shutdown().await);
}

#[tokio::test]
async fn execute_is_only_for_spooled_orders() {
    let (service, handle, now) = start().await;
    loaded_merchant(&service, now).await;

    assert!(!service.execute_order("ORDER#1+0|ada:MER-0|SELL1LOGS@1").await.expect("execute"));

    let golem = service
        .request_golem_status_change("ada", "MER-0", "transacting", &sell(1, 1, false), now)
        .await
        .expect("transact");
    let reference = golem.status_detail.expect("reference");
    assert!(!service.execute_order(&reference).await.expect("execute again"));
    assert_eq!(settled(&service, &reference).await.status, OrderStatus::Executed);
    assert!(!service.execute_order(&reference).await.expect("execute settled"));

    // The owner has no MER-1, so the order never leaves the spool.
    let orphan = service
        .spool_order(standalone_sell(1, 1), "ada", "MER-1", now)
        .expect("spool");
    assert!(!service.execute_order(&orphan).await.expect("execute orphan"));
    assert_eq!(
        service.order_by_reference(&orphan).expect("order").status,
        OrderStatus::Spooled
    );

    let zero = standalone_sell(0, 1);
    assert!(matches!(
        service.spool_order(zero, "ada", "MER-0", now),
        Err(GameError::InvalidPayload(_))
    ));

    let report = handle.shutdown().await.expect("shutdown");
    assert_eq!(report.executed, 1);
    assert_eq!(report.dead_lettered, 0);
}

#[tokio::test]
async fn harvest_accrues_on_next_read() {
    let (service, handle, now) = start().await;
    service.register_user("ada", now).await.expect("register");
    service
        .perform_ritual("ada", "summon-harvester", now)
        .await
        .expect("summon");
    service
        .request_golem_status_change("ada", "HAR-0", "harvesting", &json!({"node": "A-G-WOODLOT"}), now)
        .await
        .expect("harvest");

    let user = service.load_user("ada", after(now, 185)).await.expect("load");
    assert_eq!(user.inventories["A-G"].quantity("LOGS"), 100 + 15);

    let again = service.load_user("ada", after(now, 185)).await.expect("reload");
    assert_eq!(again.inventories["A-G"].quantity("LOGS"), 115);
    drop(handle.shutdown().await);
}

#[tokio::test]
async fn travel_blocks_until_arrival() {
    let (service, handle, now) = start().await;
    service.register_user("ada", now).await.expect("register");
    service
        .perform_ritual("ada", "summon-courier", now)
        .await
        .expect("summon");

    let golem = service
        .request_golem_status_change("ada", "COU-0", "traveling", &json!({"route": "A-G|A-F"}), now)
        .await
        .expect("travel");
    assert_eq!(golem.arrival_time, Some(after(now, 225)));

    let busy = service
        .request_golem_status_change("ada", "COU-0", "idle", &json!({}), after(now, 100))
        .await;
    assert!(matches!(busy, Err(GameError::GolemBusy { .. })));

    let user = service.load_user("ada", after(now, 225)).await.expect("load");
    let golem = &user.golems["COU-0"];
    assert_eq!(golem.location_symbol, "A-F");
    assert_eq!(golem.status, GolemStatus::Idle);
    drop(handle.shutdown().await);
}

#[tokio::test]
async fn mana_limits_summoning() {
    let (service, handle, now) = start().await;
    service.register_user("ada", now).await.expect("register");
    for _ in 0..6 {
        service
            .perform_ritual("ada", "summon-artisan", now)
            .await
            .expect("summon");
    }
    let err = service
        .perform_ritual("ada", "summon-artisan", now)
        .await
        .expect_err("out of mana");
    assert!(matches!(err, GameError::InsufficientMana { .. }));

    let user = service.load_user("ada", now).await.expect("load");
    assert_eq!(user.golems.len(), 6);
    assert!(user.golems.contains_key("ART-5"));
    drop(handle.shutdown().await);
}

#[tokio::test]
async fn registration_and_lookup_errors() {
    let (service, handle, now) = start().await;
    service.register_user("ada", now).await.expect("register");

    assert!(matches!(
        service.register_user("ada", now).await,
        Err(GameError::UserAlreadyExists(_))
    ));
    for bad in ["", "  ", "a:b", "a|b"] {
        assert!(matches!(
            service.register_user(bad, now).await,
            Err(GameError::InvalidPayload(_))
        ));
    }
    assert!(matches!(
        service.load_user("nobody", now).await,
        Err(GameError::UserNotFound(_))
    ));
    assert!(matches!(
        service
            .request_golem_status_change("ada", "MER-9", "idle", &json!({}), now)
            .await,
        Err(GameError::GolemNotFound { .. })
    ));
    assert!(matches!(
        service.order_by_reference("ORDER#0+0|ada:MER-0|SELL1LOGS@1"),
        Err(GameError::OrderNotFound(_))
    ));
    assert!(matches!(
        service.market_quote(STARTING_MARKET, "ORE", now).await,
        Err(GameError::ItemNotTraded { .. })
    ));
    drop(handle.shutdown().await);
}
