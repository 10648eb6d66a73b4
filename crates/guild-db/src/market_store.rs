//! Market records persisted under the `markets` key, one entry per symbol.

use std::collections::BTreeMap;
use std::sync::Arc;

use guild_types::Market;
use serde_json::Value;
use tracing::info;

use crate::error::DbError;
use crate::path::DocPath;
use crate::store::DocumentStore;

/// Store key holding every market.
pub const MARKETS_KEY: &str = "markets";

/// Typed access to market records.
#[derive(Debug)]
pub struct MarketRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for MarketRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> MarketRepository<S> {
    /// Wrap a shared store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Write each market that is not already stored. Existing markets keep
    /// their persisted stock. Returns how many were seeded.
    pub async fn seed_if_absent(&self, markets: &[Market]) -> Result<usize, DbError> {
        if self
            .store
            .get_at(MARKETS_KEY, &DocPath::root())
            .await?
            .is_none()
        {
            self.store
                .set_at(MARKETS_KEY, &DocPath::root(), Value::Object(serde_json::Map::new()))
                .await?;
        }

        let mut seeded: usize = 0;
        for market in markets {
            let path = DocPath::field(market.symbol.as_str());
            if self.store.get_at(MARKETS_KEY, &path).await?.is_none() {
                self.save(market).await?;
                seeded = seeded.saturating_add(1);
            }
        }
        info!(seeded, total = markets.len(), "markets seeded");
        Ok(seeded)
    }

    /// Load one market, `None` if absent.
    pub async fn load(&self, symbol: &str) -> Result<Option<Market>, DbError> {
        let value = self
            .store
            .get_at(MARKETS_KEY, &DocPath::field(symbol))
            .await?;
        value
            .map(serde_json::from_value)
            .transpose()
            .map_err(DbError::from)
    }

    /// Load every market keyed by symbol.
    pub async fn load_all(&self) -> Result<BTreeMap<String, Market>, DbError> {
        let value = self.store.get_at(MARKETS_KEY, &DocPath::root()).await?;
        match value {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Write one market.
    pub async fn save(&self, market: &Market) -> Result<(), DbError> {
        let value = serde_json::to_value(market)?;
        self.store
            .set_at(MARKETS_KEY, &DocPath::field(market.symbol.as_str()), value)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::memory::MemoryStore;

    fn market(symbol: &str, logs: u64) -> Market {
        Market {
            symbol: symbol.to_owned(),
            name: symbol.to_owned(),
            pricing: BTreeMap::new(),
            stock: BTreeMap::from([("LOGS".to_owned(), logs)]),
            consumption: BTreeMap::new(),
            production: BTreeMap::new(),
            last_drift_tick: Utc::now(),
        }
    }

    #[tokio::test]
    async fn seeding_keeps_existing_stock() {
        let repo = MarketRepository::new(Arc::new(MemoryStore::new()));
        assert_eq!(repo.seed_if_absent(&[market("M1", 5)]).await.unwrap(), 1);

        let mut traded = market("M1", 5);
        traded.stock.insert("LOGS".to_owned(), 17);
        repo.save(&traded).await.unwrap();

        let seeded = repo
            .seed_if_absent(&[market("M1", 5), market("M2", 1)])
            .await
            .unwrap();
        assert_eq!(seeded, 1);

        let m1 = repo.load("M1").await.unwrap().unwrap();
        assert_eq!(m1.stock_of("LOGS"), 17);

        let all = repo.load_all().await.unwrap();
        assert_eq!(all.keys().cloned().collect::<Vec<_>>(), vec!["M1", "M2"]);
    }

    #[tokio::test]
    async fn unknown_market_loads_as_none() {
        let repo = MarketRepository::new(Arc::new(MemoryStore::new()));
        assert_eq!(repo.load("nowhere").await.unwrap(), None);
        assert!(repo.load_all().await.unwrap().is_empty());
    }
}
