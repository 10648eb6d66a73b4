//! `Dragonfly` (Redis-compatible) document store using `RedisJSON` commands.
//!
//! Documents are stored with `JSON.SET` and addressed with legacy path
//! syntax (`.` for the root, `["golems"]["HAR-0"]` below it).
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `user:{username}` | JSON | Full user record |
//! | `markets` | JSON | Market symbol to market record |

use fred::interfaces::RedisJsonInterface;
use fred::prelude::*;
use serde_json::Value;

use crate::error::DbError;
use crate::path::DocPath;
use crate::store::{DocumentStore, lookup};

/// Connection handle to a `Dragonfly` instance.
///
/// Wraps a [`fred::prelude::Client`]; clones share the same connection.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!(url, "Connected to Dragonfly");
        Ok(Self { client })
    }
}

impl DocumentStore for DragonflyStore {
    async fn get_at(&self, key: &str, path: &DocPath) -> Result<Option<Value>, DbError> {
        // Missing legacy paths are errors in RedisJSON, so fetch the whole
        // document and resolve the path locally.
        let raw: Option<String> = self
            .client
            .json_get(key, None::<String>, None::<String>, None::<String>, ".")
            .await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let doc: Value = serde_json::from_str(&raw)?;
        Ok(lookup(&doc, path).cloned())
    }

    async fn set_at(&self, key: &str, path: &DocPath, value: Value) -> Result<(), DbError> {
        let _: () = self
            .client
            .json_set(key, path.to_legacy(), value, None)
            .await?;
        Ok(())
    }

    async fn delete_at(&self, key: &str, path: &DocPath) -> Result<u64, DbError> {
        let deleted: i64 = self.client.json_del(key, path.to_legacy()).await?;
        Ok(u64::try_from(deleted).unwrap_or(0))
    }
}
