//! Simulation core for Guild Golems.
//!
//! Users own golems that harvest, travel, haul cargo, invoke mana and sell
//! goods on markets. Every time-driven effect is computed lazily when a
//! user or market is next read; nothing ticks on a timer.
//!
//! # Architecture
//!
//! ```text
//!              GameService
//!     ┌────────────┼─────────────────┐
//!     │            │                 │
//!  GolemLocks   tick / status /   OrderBook ──▶ clearinghouse worker
//!  CommitGates  transition /      (spool)        (single consumer)
//!               rituals               │
//!     │            │                 │
//!     └────────────┴──── guild-db ───┘
//! ```
//!
//! # Modules
//!
//! - [`config`] -- YAML game configuration with defaults
//! - [`error`] -- The [`GameError`] taxonomy with stable codes
//! - [`inventory`] -- Checked inventory arithmetic
//! - [`pricing`] -- The spot price curve
//! - [`tick`] -- Lazy recomputation of mana, travel, harvest and drift
//! - [`status`] -- Archetype rules and transition pre-checks
//! - [`transition`] -- Per-status payload handlers
//! - [`lock`] -- Golem edit locks and per-user commit gates
//! - [`rituals`] -- Registration defaults and summoning
//! - [`clearinghouse`] -- Order spool, order table and settlement worker
//! - [`service`] -- The operations exposed to clients

pub mod clearinghouse;
pub mod config;
pub mod error;
pub mod inventory;
pub mod lock;
pub mod pricing;
pub mod rituals;
pub mod service;
pub mod status;
pub mod tick;
pub mod transition;

pub use clearinghouse::{ClearinghouseHandle, DeadLetter, OrderReference, WorkerReport};
pub use config::{ConfigError, GameConfig, StoreBackend};
pub use error::{ErrorCode, ErrorKind, GameError};
pub use pricing::{PricingError, spot_price};
pub use service::{GameService, MarketQuote};
pub use status::StatusRules;
pub use tick::{RecomputeSummary, TickError, recompute_user};
