//! Configuration loading and typed config structures for the Guild Golems
//! simulation core.
//!
//! The canonical configuration lives in `guild-config.yaml` at the project
//! root. Every field has a default, so an empty file (or no file at all)
//! yields the standard game balance.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use guild_types::{Archetype, GolemStatus};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is internally inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level game configuration.
///
/// Mirrors the structure of `guild-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameConfig {
    /// Mana pool parameters.
    #[serde(default)]
    pub mana: ManaConfig,

    /// Starting values for new users.
    #[serde(default)]
    pub user: UserConfig,

    /// Per-archetype allowed statuses, capacity and travel factor.
    /// Archetypes missing from the file keep their defaults.
    #[serde(default = "default_archetypes")]
    pub archetypes: BTreeMap<Archetype, ArchetypeConfig>,

    /// Ritual name to ritual definition.
    #[serde(default = "default_rituals")]
    pub rituals: BTreeMap<String, RitualConfig>,

    /// Market drift parameters.
    #[serde(default)]
    pub market: MarketConfig,

    /// Clearinghouse queue and reaper parameters.
    #[serde(default)]
    pub clearinghouse: ClearinghouseConfig,

    /// Store backend selection.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Optional world and market data files.
    #[serde(default)]
    pub world: WorldConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mana: ManaConfig::default(),
            user: UserConfig::default(),
            archetypes: default_archetypes(),
            rituals: default_rituals(),
            market: MarketConfig::default(),
            clearinghouse: ClearinghouseConfig::default(),
            infrastructure: InfrastructureConfig::default(),
            world: WorldConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GameConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure:
    /// - `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url`
    /// - `GUILD_STORE_BACKEND` overrides `infrastructure.store_backend`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        for (archetype, defaults) in default_archetypes() {
            config.archetypes.entry(archetype).or_insert(defaults);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency.
    ///
    /// Every archetype must allow `idle` (golems fall back to it after
    /// every completed task), every ritual must start its golem in a
    /// status its archetype allows, and periods must be positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (archetype, rules) in &self.archetypes {
            if !rules.allowed_statuses.contains(&GolemStatus::Idle) {
                return Err(ConfigError::Invalid(format!(
                    "archetype {archetype} does not allow idle"
                )));
            }
        }

        for (name, ritual) in &self.rituals {
            let allowed = self
                .archetypes
                .get(&ritual.archetype)
                .is_some_and(|rules| rules.allowed_statuses.contains(&ritual.starting_status));
            if !allowed {
                return Err(ConfigError::Invalid(format!(
                    "ritual {name} starts {} golem as {}, which is not allowed",
                    ritual.archetype, ritual.starting_status
                )));
            }
            if !ritual.mana_cost.is_finite() || ritual.mana_cost < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "ritual {name} has an invalid mana cost"
                )));
            }
        }

        if self.market.drift_tick_seconds == 0 {
            return Err(ConfigError::Invalid(
                "market.drift_tick_seconds must be positive".to_owned(),
            ));
        }
        if self.clearinghouse.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "clearinghouse.queue_capacity must be positive".to_owned(),
            ));
        }
        if self.clearinghouse.reap_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "clearinghouse.reap_interval_seconds must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mana
// ---------------------------------------------------------------------------

/// Mana pool parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManaConfig {
    /// Mana a new user starts with.
    #[serde(default = "default_starting_mana")]
    pub starting_mana: f64,

    /// Maximum mana a user can hold.
    #[serde(default = "default_mana_cap")]
    pub mana_cap: f64,

    /// Base regeneration per second.
    #[serde(default = "default_mana_regen")]
    pub mana_regen: f64,

    /// Extra regeneration per second per invoking golem.
    #[serde(default = "default_invoker_potency")]
    pub invoker_potency: f64,
}

impl Default for ManaConfig {
    fn default() -> Self {
        Self {
            starting_mana: default_starting_mana(),
            mana_cap: default_mana_cap(),
            mana_regen: default_mana_regen(),
            invoker_potency: default_invoker_potency(),
        }
    }
}

const fn default_starting_mana() -> f64 {
    3600.0
}

const fn default_mana_cap() -> f64 {
    21600.0
}

const fn default_mana_regen() -> f64 {
    1.0
}

const fn default_invoker_potency() -> f64 {
    0.5
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Starting values for new users.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserConfig {
    /// Coins a new user starts with.
    #[serde(default)]
    pub starting_coins: u64,

    /// Locale where new golems appear.
    #[serde(default = "default_starting_location")]
    pub starting_location: String,

    /// Location to item quantities granted at registration.
    #[serde(default = "default_starting_inventory")]
    pub starting_inventory: BTreeMap<String, BTreeMap<String, u64>>,

    /// Rituals a new user knows.
    #[serde(default = "default_starting_rituals")]
    pub starting_rituals: Vec<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            starting_coins: 0,
            starting_location: default_starting_location(),
            starting_inventory: default_starting_inventory(),
            starting_rituals: default_starting_rituals(),
        }
    }
}

fn default_starting_location() -> String {
    "A-G".to_owned()
}

fn default_starting_inventory() -> BTreeMap<String, BTreeMap<String, u64>> {
    BTreeMap::from([(
        "A-G".to_owned(),
        BTreeMap::from([("LOGS".to_owned(), 100)]),
    )])
}

fn default_starting_rituals() -> Vec<String> {
    default_rituals().into_keys().collect()
}

// ---------------------------------------------------------------------------
// Archetypes
// ---------------------------------------------------------------------------

/// Rules for one archetype.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchetypeConfig {
    /// Statuses a golem of this archetype may enter.
    pub allowed_statuses: Vec<GolemStatus>,

    /// Carrying capacity in weight units.
    #[serde(default)]
    pub capacity: u64,

    /// Travel time as a percentage of the route's base travel time.
    #[serde(default = "default_travel_time_pct")]
    pub travel_time_pct: u64,
}

const fn default_travel_time_pct() -> u64 {
    100
}

fn archetype(allowed: &[GolemStatus], capacity: u64, travel_time_pct: u64) -> ArchetypeConfig {
    ArchetypeConfig {
        allowed_statuses: allowed.to_vec(),
        capacity,
        travel_time_pct,
    }
}

/// The standard archetype table.
pub fn default_archetypes() -> BTreeMap<Archetype, ArchetypeConfig> {
    use GolemStatus::{Harvesting, Idle, Invoking, Packing, Storing, Transacting, Traveling};

    BTreeMap::from([
        (Archetype::Invoker, archetype(&[Idle, Invoking], 0, 100)),
        (
            Archetype::Harvester,
            archetype(&[Idle, Harvesting, Traveling], 10, 100),
        ),
        (
            Archetype::Courier,
            archetype(&[Idle, Traveling, Packing, Storing], 50, 75),
        ),
        (Archetype::Artisan, archetype(&[Idle, Traveling], 10, 100)),
        (
            Archetype::Merchant,
            archetype(&[Idle, Traveling, Packing, Storing, Transacting], 25, 100),
        ),
    ])
}

// ---------------------------------------------------------------------------
// Rituals
// ---------------------------------------------------------------------------

/// A ritual that summons a new golem.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RitualConfig {
    /// Archetype of the summoned golem.
    pub archetype: Archetype,

    /// Mana consumed.
    pub mana_cost: f64,

    /// Status the golem starts in.
    #[serde(default = "default_starting_status")]
    pub starting_status: GolemStatus,
}

const fn default_starting_status() -> GolemStatus {
    GolemStatus::Idle
}

/// The standard summoning rituals.
pub fn default_rituals() -> BTreeMap<String, RitualConfig> {
    Archetype::ALL
        .into_iter()
        .map(|archetype| {
            let starting_status = if archetype == Archetype::Invoker {
                GolemStatus::Invoking
            } else {
                GolemStatus::Idle
            };
            (
                format!("summon-{archetype}"),
                RitualConfig {
                    archetype,
                    mana_cost: 600.0,
                    starting_status,
                },
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// Market drift parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarketConfig {
    /// Seconds per consumption/production tick.
    #[serde(default = "default_drift_tick_seconds")]
    pub drift_tick_seconds: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            drift_tick_seconds: default_drift_tick_seconds(),
        }
    }
}

const fn default_drift_tick_seconds() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Clearinghouse
// ---------------------------------------------------------------------------

/// Clearinghouse queue and reaper parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClearinghouseConfig {
    /// Orders the queue admits before `execute` waits.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Age after which a still-spooled order is reaped.
    #[serde(default = "default_abandoned_order_ttl_seconds")]
    pub abandoned_order_ttl_seconds: u64,

    /// How often the engine runs the reaper.
    #[serde(default = "default_reap_interval_seconds")]
    pub reap_interval_seconds: u64,

    /// Dead letters retained before the oldest are dropped.
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

impl Default for ClearinghouseConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            abandoned_order_ttl_seconds: default_abandoned_order_ttl_seconds(),
            reap_interval_seconds: default_reap_interval_seconds(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

const fn default_queue_capacity() -> usize {
    1
}

const fn default_abandoned_order_ttl_seconds() -> u64 {
    3600
}

const fn default_reap_interval_seconds() -> u64 {
    60
}

const fn default_dead_letter_capacity() -> usize {
    256
}

// ---------------------------------------------------------------------------
// Infrastructure
// ---------------------------------------------------------------------------

/// Which document store backs the game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store; state is lost on exit.
    #[default]
    Memory,
    /// `Dragonfly` with `RedisJSON`.
    Dragonfly,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "dragonfly" => Ok(Self::Dragonfly),
            other => Err(ConfigError::Invalid(format!("unknown store backend: {other}"))),
        }
    }
}

/// Infrastructure connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Store backend.
    #[serde(default)]
    pub store_backend: StoreBackend,

    /// `Dragonfly` connection URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,
}

impl InfrastructureConfig {
    /// Apply environment variable overrides.
    ///
    /// An unparseable `GUILD_STORE_BACKEND` is ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        }
        if let Ok(val) = std::env::var("GUILD_STORE_BACKEND") {
            match val.parse() {
                Ok(backend) => self.store_backend = backend,
                Err(e) => tracing::warn!(error = %e, "ignoring GUILD_STORE_BACKEND"),
            }
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::default(),
            dragonfly_url: default_dragonfly_url(),
        }
    }
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

// ---------------------------------------------------------------------------
// World and logging
// ---------------------------------------------------------------------------

/// Optional world data files. Absent files fall back to the built-in
/// starting world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// JSON world definition.
    #[serde(default)]
    pub world_file: Option<PathBuf>,

    /// JSON array of markets to seed.
    #[serde(default)]
    pub markets_file: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}
