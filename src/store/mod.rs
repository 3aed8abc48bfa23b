//! Key-value store primitives the feed core is written against.
//!
//! The core needs three kinds of values: integer counters, flat field maps,
//! and score-ordered sets. [`SqliteStore`] persists them; [`MemoryStore`]
//! keeps them in process memory.

mod memory;
mod migrations;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to a store backend.
pub type SharedStore = Arc<dyn KvStore>;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increment the counter at `key` (missing counts as 0) and
    /// return the new value.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Read a counter. `None` when it was never incremented.
    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Replace the whole field map at `key` with `fields`. Fields not listed
    /// are removed.
    async fn hreplace(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Read the whole field map. Empty when the key does not exist.
    async fn hget_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    async fn hexists(&self, key: &str) -> StoreResult<bool>;

    /// Add `delta` to an integer field and return the new value. A missing
    /// field counts as 0.
    ///
    /// Fails with [`StoreError::NotAnInteger`] and leaves the field unchanged
    /// if the stored value does not parse as an integer.
    async fn hincr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// Insert `member` with `score`, replacing the score if it is already present.
    async fn zadd(&self, key: &str, member: &str, score: i64) -> StoreResult<()>;

    async fn zcard(&self, key: &str) -> StoreResult<u64>;

    /// Members by ascending score, skipping `start` and returning at most `count`.
    async fn zrange(&self, key: &str, start: u64, count: u64) -> StoreResult<Vec<(String, i64)>>;

    /// Members by descending score, skipping `start` and returning at most `count`.
    async fn zrevrange(&self, key: &str, start: u64, count: u64)
        -> StoreResult<Vec<(String, i64)>>;

    /// Remove and return up to `count` lowest-scored members.
    async fn zpopmin(&self, key: &str, count: u64) -> StoreResult<Vec<(String, i64)>>;
}

/// Open the store named by a database path. `:memory:` selects [`MemoryStore`].
///
/// # Errors
///
/// Returns an error if the SQLite database cannot be opened or migrated.
pub async fn open(path: &Path) -> StoreResult<SharedStore> {
    if path.as_os_str() == ":memory:" {
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(SqliteStore::new(path).await?))
}

pub(crate) fn parse_int(key: &str, value: &str) -> StoreResult<i64> {
    value.trim().parse().map_err(|_| StoreError::NotAnInteger {
        key: key.to_string(),
        value: value.to_string(),
    })
}
