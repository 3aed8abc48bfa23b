//! Per-forum post id allocation.

use tracing::{debug, error};

use crate::error::{FeedError, Result};
use crate::store::SharedStore;

use super::store::record_key;

/// Key of the per-forum id counter.
#[must_use]
pub fn counter_key(forum: &str) -> String {
    format!("count:post:{forum}")
}

/// Issues strictly increasing ids per forum from the store's atomic counter.
#[derive(Clone)]
pub struct IdAllocator {
    store: SharedStore,
}

impl IdAllocator {
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Allocate the next id for `forum`.
    ///
    /// Never retried here; a failed caller leaves the id unused forever.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the increment fails.
    pub async fn allocate(&self, forum: &str) -> Result<i64> {
        let id = self.store.incr(&counter_key(forum)).await?;
        debug!(forum, id, "Allocated post id");
        Ok(id)
    }

    /// Highest id ever allocated to `forum`, 0 if none.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the counter cannot be read.
    pub async fn frontier(&self, forum: &str) -> Result<i64> {
        Ok(self.store.get_int(&counter_key(forum)).await?.unwrap_or(0))
    }

    /// Allocate an id and confirm no record already occupies it in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Integrity`] if a record already exists under the
    /// new id, which means the counter fell behind the stored records.
    pub async fn allocate_checked(&self, table: &str, forum: &str) -> Result<i64> {
        let id = self.allocate(forum).await?;
        let key = record_key(table, forum, id);
        if self.store.hexists(&key).await? {
            error!(%key, "Freshly allocated id already has a record");
            return Err(FeedError::Integrity(format!(
                "allocated id {id} for forum {forum} collides with existing record {key}"
            )));
        }
        Ok(id)
    }
}
