//! The keyed JSON document store interface.
//!
//! Every persisted record lives under a string key as one JSON document.
//! Reads return the value at a path; writes replace the value at a path.
//! Targeted writes let concurrent actors update disjoint parts of the same
//! document without clobbering each other.

use core::future::Future;

use serde_json::Value;

use crate::error::DbError;
use crate::path::DocPath;

/// A keyed store of JSON documents addressable by [`DocPath`].
pub trait DocumentStore: Send + Sync + 'static {
    /// Read the value at `path` under `key`. `None` when the key or path
    /// does not exist.
    fn get_at(
        &self,
        key: &str,
        path: &DocPath,
    ) -> impl Future<Output = Result<Option<Value>, DbError>> + Send;

    /// Write `value` at `path` under `key`.
    ///
    /// A root write creates or replaces the whole document. A non-root
    /// write requires the parent object to exist.
    fn set_at(
        &self,
        key: &str,
        path: &DocPath,
        value: Value,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Delete the value at `path` under `key`, returning how many values
    /// were removed. Deleting the root removes the key.
    fn delete_at(
        &self,
        key: &str,
        path: &DocPath,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;
}

/// Resolve `path` inside `doc`.
pub fn lookup<'a>(doc: &'a Value, path: &DocPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(doc, |current, segment| current.as_object()?.get(segment))
}

/// Resolve `path` inside `doc` for mutation.
pub fn lookup_mut<'a>(doc: &'a mut Value, path: &DocPath) -> Option<&'a mut Value> {
    path.segments()
        .iter()
        .try_fold(doc, |current, segment| current.as_object_mut()?.get_mut(segment))
}
