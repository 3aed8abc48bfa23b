use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{parse_int, KvStore, StoreResult};

#[derive(Debug, Default)]
struct ScoredSet {
    by_member: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl ScoredSet {
    fn insert(&mut self, member: &str, score: i64) {
        if let Some(old) = self.by_member.insert(member.to_string(), score) {
            self.ordered.remove(&(old, member.to_string()));
        }
        self.ordered.insert((score, member.to_string()));
    }

    fn pop_min(&mut self) -> Option<(String, i64)> {
        let (score, member) = self.ordered.pop_first()?;
        self.by_member.remove(&member);
        Some((member, score))
    }
}

#[derive(Debug, Default)]
struct Inner {
    counters: HashMap<String, i64>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, ScoredSet>,
}

/// Process-local store. Every operation takes one lock, so each call is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn window(
    items: impl Iterator<Item = (String, i64)>,
    start: u64,
    count: u64,
) -> Vec<(String, i64)> {
    items.skip(start as usize).take(count as usize).collect()
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut inner = self.inner.lock().await;
        let value = inner.counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.inner.lock().await.counters.get(key).copied())
    }

    async fn hreplace(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let map = fields
            .iter()
            .map(|(field, value)| ((*field).to_string(), value.clone()))
            .collect();
        inner.hashes.insert(key.to_string(), map);
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        Ok(self
            .inner
            .lock()
            .await
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn hexists(&self, key: &str) -> StoreResult<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .hashes
            .get(key)
            .is_some_and(|map| !map.is_empty()))
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut inner = self.inner.lock().await;
        let map = inner.hashes.entry(key.to_string()).or_default();
        let current = match map.get(field) {
            Some(value) => parse_int(key, value)?,
            None => 0,
        };
        let next = current + delta;
        map.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member, score);
        Ok(())
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        Ok(self
            .inner
            .lock()
            .await
            .sets
            .get(key)
            .map_or(0, |set| set.by_member.len() as u64))
    }

    async fn zrange(&self, key: &str, start: u64, count: u64) -> StoreResult<Vec<(String, i64)>> {
        let inner = self.inner.lock().await;
        Ok(inner.sets.get(key).map_or_else(Vec::new, |set| {
            window(
                set.ordered.iter().map(|(s, m)| (m.clone(), *s)),
                start,
                count,
            )
        }))
    }

    async fn zrevrange(
        &self,
        key: &str,
        start: u64,
        count: u64,
    ) -> StoreResult<Vec<(String, i64)>> {
        let inner = self.inner.lock().await;
        Ok(inner.sets.get(key).map_or_else(Vec::new, |set| {
            window(
                set.ordered.iter().rev().map(|(s, m)| (m.clone(), *s)),
                start,
                count,
            )
        }))
    }

    async fn zpopmin(&self, key: &str, count: u64) -> StoreResult<Vec<(String, i64)>> {
        let mut inner = self.inner.lock().await;
        let Some(set) = inner.sets.get_mut(key) else {
            return Ok(Vec::new());
        };
        let mut popped = Vec::new();
        while (popped.len() as u64) < count {
            match set.pop_min() {
                Some(entry) => popped.push(entry),
                None => break,
            }
        }
        Ok(popped)
    }
}
