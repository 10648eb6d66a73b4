//! Engine binary for the Guild Golems simulation.
//!
//! Wires together configuration, logging, the world catalog, the store
//! backend, the game service with its clearinghouse worker, and the
//! abandoned-order reaper. Runs until interrupted, then drains the
//! clearinghouse and exits.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `guild-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Load the world catalog and the markets to seed
//! 4. Connect the configured store backend
//! 5. Seed markets that are not stored yet
//! 6. Start the game service and its clearinghouse worker
//! 7. Run the reaper on an interval until ctrl-c
//! 8. Drain the clearinghouse and log its report

mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use guild_core::config::{LoggingConfig, WorldConfig};
use guild_core::{GameConfig, GameService, StoreBackend};
use guild_db::{DocumentStore, DragonflyStore, MarketRepository, MemoryStore};
use guild_types::Market;
use guild_world::{StaticWorld, WorldCatalog, markets_from_file, starting_markets, starting_world};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const CONFIG_FILE: &str = "guild-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any startup step fails or the clearinghouse does
/// not shut down cleanly.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("guild-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        store_backend = ?config.infrastructure.store_backend,
        queue_capacity = config.clearinghouse.queue_capacity,
        drift_tick_seconds = config.market.drift_tick_seconds,
        "Configuration loaded"
    );

    // 3. Load the world catalog and markets.
    let world = load_world(&config.world)?;
    let markets = load_markets(&config.world)?;
    world.check_markets(&markets)?;
    info!(
        locales = world.locales().count(),
        routes = world.route_count(),
        markets = markets.len(),
        "World loaded"
    );

    // 4. Connect the store and hand off to the generic runner.
    match config.infrastructure.store_backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            run(config, world, markets, Arc::new(MemoryStore::new())).await?;
        }
        StoreBackend::Dragonfly => {
            let store = DragonflyStore::connect(&config.infrastructure.dragonfly_url).await?;
            run(config, world, markets, Arc::new(store)).await?;
        }
    }

    Ok(())
}

/// Load `guild-config.yaml` from the working directory, falling back to
/// defaults. The flag reports whether the file was found.
fn load_config() -> Result<(GameConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok((GameConfig::from_file(config_path)?, true))
    } else {
        let mut config = GameConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok((config, false))
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_world(config: &WorldConfig) -> Result<StaticWorld, EngineError> {
    let world = match &config.world_file {
        Some(path) => {
            info!(path = %path.display(), "Loading world file");
            StaticWorld::from_file(path)?
        }
        None => starting_world()?,
    };
    Ok(world)
}

fn load_markets(config: &WorldConfig) -> Result<Vec<Market>, EngineError> {
    let markets = match &config.markets_file {
        Some(path) => {
            info!(path = %path.display(), "Loading markets file");
            markets_from_file(path)?
        }
        None => starting_markets(Utc::now()),
    };
    Ok(markets)
}

/// Seed markets, start the service and block until ctrl-c.
async fn run<S: DocumentStore>(
    config: GameConfig,
    world: StaticWorld,
    markets: Vec<Market>,
    store: Arc<S>,
) -> Result<(), EngineError> {
    // 5. Seed markets.
    let seeded = MarketRepository::new(Arc::clone(&store))
        .seed_if_absent(&markets)
        .await?;
    info!(seeded, total = markets.len(), "Markets seeded");

    // 6. Start the service.
    let reap_interval = Duration::from_secs(config.clearinghouse.reap_interval_seconds.max(1));
    let (service, handle) = GameService::start(config, Arc::new(world), store);
    info!("Game service started");

    // 7. Reap abandoned orders until shutdown.
    let (stop, stop_rx) = watch::channel(false);
    let reaper = tokio::spawn(reap_loop(service, reap_interval, stop_rx));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| EngineError::Signal {
            message: format!("{e}"),
        })?;
    info!("Shutdown requested");

    if stop.send(true).is_err() {
        debug!("reaper already stopped");
    }
    if let Err(e) = reaper.await {
        warn!(error = %e, "reaper task failed");
    }

    // 8. Drain the clearinghouse.
    let report = handle.shutdown().await?;
    info!(
        executed = report.executed,
        cancelled = report.cancelled,
        dead_lettered = report.dead_lettered,
        "guild-engine shutdown complete"
    );
    Ok(())
}

async fn reap_loop<S: DocumentStore, W: WorldCatalog + 'static>(
    service: GameService<S, W>,
    every: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let reaped = service.reap_abandoned_orders(Utc::now()).await;
                if reaped > 0 {
                    debug!(reaped, "reaper pass complete");
                }
            }
        }
    }
}
