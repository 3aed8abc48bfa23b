//! Per-key async mutexes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Hands out one async mutex per key so that read-modify-write sequences on
/// the same key run one at a time while different keys proceed in parallel.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.get_or_create(key).await.lock_owned().await
    }

    async fn get_or_create(&self, key: &str) -> Arc<Mutex<()>> {
        {
            let read_guard = self.locks.read().await;
            if let Some(lock) = read_guard.get(key) {
                return Arc::clone(lock);
            }
        }

        let mut write_guard = self.locks.write().await;
        // Another task may have inserted while we waited for the write lock.
        if let Some(lock) = write_guard.get(key) {
            return Arc::clone(lock);
        }

        let lock = Arc::new(Mutex::new(()));
        write_guard.insert(key.to_string(), Arc::clone(&lock));
        lock
    }

    #[cfg(test)]
    pub async fn key_count(&self) -> usize {
        self.locks.read().await.len()
    }
}
