//! In-process document store.
//!
//! Holds every document in a `HashMap` behind a tokio [`RwLock`]. Used by
//! tests and by the engine when `store_backend` is `memory`.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::path::DocPath;
use crate::store::{DocumentStore, lookup, lookup_mut};

/// A [`DocumentStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held.
    pub async fn key_count(&self) -> usize {
        self.docs.read().await.len()
    }
}

impl DocumentStore for MemoryStore {
    async fn get_at(&self, key: &str, path: &DocPath) -> Result<Option<Value>, DbError> {
        let docs = self.docs.read().await;
        Ok(docs.get(key).and_then(|doc| lookup(doc, path)).cloned())
    }

    async fn set_at(&self, key: &str, path: &DocPath, value: Value) -> Result<(), DbError> {
        let mut docs = self.docs.write().await;
        let Some((parent, last)) = path.split_last() else {
            docs.insert(key.to_owned(), value);
            return Ok(());
        };

        let parent_object = docs
            .get_mut(key)
            .and_then(|doc| lookup_mut(doc, &parent))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| DbError::PathNotFound {
                key: key.to_owned(),
                path: path.to_legacy(),
            })?;
        parent_object.insert(last.to_owned(), value);
        Ok(())
    }

    async fn delete_at(&self, key: &str, path: &DocPath) -> Result<u64, DbError> {
        let mut docs = self.docs.write().await;
        let Some((parent, last)) = path.split_last() else {
            return Ok(u64::from(docs.remove(key).is_some()));
        };

        let removed = docs
            .get_mut(key)
            .and_then(|doc| lookup_mut(doc, &parent))
            .and_then(Value::as_object_mut)
            .and_then(|object| object.remove(last));
        Ok(u64::from(removed.is_some()))
    }
}
