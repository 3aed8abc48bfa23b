//! Capacity-bounded recency index of post references.
//!
//! Entries are `forum:id` members scored by id. Trimming happens only when
//! the appended id is a multiple of the purge interval, so between
//! checkpoints the set may hold up to `purge_interval - 1` extra entries.

use tracing::debug;

use super::locks::KeyedLocks;
use super::model::PostRef;
use crate::error::Result;
use crate::store::SharedStore;

pub const DEFAULT_CAPACITY: u64 = 25_000;
pub const DEFAULT_PURGE_INTERVAL: i64 = 100;

/// Name of the global recency index.
pub const HOME_INDEX: &str = "home";

#[must_use]
pub fn index_key(name: &str) -> String {
    format!("index:{name}")
}

pub struct IndexEvictor {
    store: SharedStore,
    capacity: u64,
    purge_interval: i64,
    locks: KeyedLocks,
}

impl IndexEvictor {
    #[must_use]
    pub fn new(store: SharedStore, capacity: u64, purge_interval: i64) -> Self {
        Self {
            store,
            capacity,
            purge_interval: purge_interval.max(1),
            locks: KeyedLocks::new(),
        }
    }

    #[must_use]
    pub fn with_defaults(store: SharedStore) -> Self {
        Self::new(store, DEFAULT_CAPACITY, DEFAULT_PURGE_INTERVAL)
    }

    /// Insert `post` into index `name`, trimming the lowest-scored entries
    /// back to capacity when the id lands on a purge checkpoint.
    ///
    /// Returns the number of evicted entries.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any set operation fails.
    pub async fn append(&self, name: &str, post: &PostRef) -> Result<u64> {
        let key = index_key(name);
        let _guard = self.locks.lock(&key).await;

        self.store.zadd(&key, &post.to_string(), post.id).await?;
        if post.id % self.purge_interval != 0 {
            return Ok(0);
        }

        let size = self.store.zcard(&key).await?;
        if size <= self.capacity {
            return Ok(0);
        }
        let excess = size - self.capacity;
        let evicted = self.store.zpopmin(&key, excess).await?.len() as u64;
        debug!(index = %key, evicted, capacity = self.capacity, "Trimmed index");
        Ok(evicted)
    }

    /// Newest entries first.
    ///
    /// Members that do not parse as post references are skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the range read fails.
    pub async fn recent(&self, name: &str, offset: u64, limit: u64) -> Result<Vec<PostRef>> {
        let rows = self
            .store
            .zrevrange(&index_key(name), offset, limit)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(member, _)| member.parse().ok())
            .collect())
    }

    /// # Errors
    ///
    /// Returns a storage error if the count fails.
    pub async fn len(&self, name: &str) -> Result<u64> {
        Ok(self.store.zcard(&index_key(name)).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{KvStore, MemoryStore};

    #[tokio::test]
    async fn test_bounded_at_every_checkpoint() {
        let store = Arc::new(MemoryStore::new());
        let index = IndexEvictor::with_defaults(store.clone());

        for id in 1..=25_100 {
            index.append(HOME_INDEX, &PostRef::new("World News", id)).await.unwrap();
            if id % DEFAULT_PURGE_INTERVAL == 0 {
                assert!(index.len(HOME_INDEX).await.unwrap() <= DEFAULT_CAPACITY);
            }
        }

        assert_eq!(index.len(HOME_INDEX).await.unwrap(), DEFAULT_CAPACITY);
        let lowest = store.zrange("index:home", 0, 1).await.unwrap();
        assert_eq!(lowest[0].1, 101);
        let newest = index.recent(HOME_INDEX, 0, 1).await.unwrap();
        assert_eq!(newest, vec![PostRef::new("World News", 25_100)]);
    }

    #[tokio::test]
    async fn test_overshoot_between_checkpoints() {
        let index = IndexEvictor::new(Arc::new(MemoryStore::new()), 5, 10);
        for id in 1..=9 {
            assert_eq!(index.append(HOME_INDEX, &PostRef::new("Ask", id)).await.unwrap(), 0);
        }
        assert_eq!(index.len(HOME_INDEX).await.unwrap(), 9);

        assert_eq!(index.append(HOME_INDEX, &PostRef::new("Ask", 10)).await.unwrap(), 5);
        let kept = index.recent(HOME_INDEX, 0, 10).await.unwrap();
        let ids: Vec<i64> = kept.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 9, 8, 7, 6]);
    }
}
