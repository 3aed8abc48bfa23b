//! Latest snapshot per feed, swapped atomically on rebuild.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{FeedBuilder, FeedSnapshot};
use crate::error::{FeedError, Result};

struct FeedSlot {
    current: ArcSwapOption<FeedSnapshot>,
    /// Held for the whole build-and-swap so an older build never lands
    /// after a newer one.
    rebuild: Mutex<()>,
}

/// Holds the current snapshot of every feed in the schema.
///
/// Readers load the current pointer without locking and never see a
/// half-built snapshot. Rebuilds of one feed are serialized; different feeds
/// rebuild independently.
pub struct FeedCache {
    builder: FeedBuilder,
    slots: HashMap<String, FeedSlot>,
}

impl FeedCache {
    #[must_use]
    pub fn new(builder: FeedBuilder) -> Self {
        let slots = builder
            .schema()
            .feed_names()
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    FeedSlot {
                        current: ArcSwapOption::empty(),
                        rebuild: Mutex::new(()),
                    },
                )
            })
            .collect();
        Self { builder, slots }
    }

    /// Feed names in rotation order.
    #[must_use]
    pub fn feed_names(&self) -> &[String] {
        self.builder.schema().feed_names()
    }

    /// Current snapshot of `feed`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for an unknown feed and
    /// [`FeedError::NotFound`] before its first successful build.
    pub fn get_current(&self, feed: &str) -> Result<Arc<FeedSnapshot>> {
        self.slot(feed)?
            .current
            .load_full()
            .ok_or_else(|| FeedError::NotFound(format!("feed {feed} has not been built yet")))
    }

    /// Rebuild `feed`, waiting behind any rebuild of it already running.
    ///
    /// The stored snapshot is replaced only after the build succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for an unknown feed or
    /// [`FeedError::Rebuild`] if construction fails; the previous snapshot
    /// stays in place.
    pub async fn rebuild(&self, feed: &str) -> Result<Arc<FeedSnapshot>> {
        let slot = self.slot(feed)?;
        let _guard = slot.rebuild.lock().await;
        self.build_and_swap(feed, slot).await
    }

    /// Rebuild `feed` unless a rebuild of it is already running, in which
    /// case `Ok(None)` is returned immediately.
    ///
    /// # Errors
    ///
    /// Same as [`Self::rebuild`].
    pub async fn try_rebuild(&self, feed: &str) -> Result<Option<Arc<FeedSnapshot>>> {
        let slot = self.slot(feed)?;
        let Ok(_guard) = slot.rebuild.try_lock() else {
            debug!(feed, "Rebuild already in flight, skipping");
            return Ok(None);
        };
        self.build_and_swap(feed, slot).await.map(Some)
    }

    /// Rebuild every feed once. Failures are logged and counted, not returned.
    ///
    /// Returns the number of feeds rebuilt successfully.
    pub async fn rebuild_all(&self) -> usize {
        let mut built = 0;
        for feed in self.feed_names() {
            match self.rebuild(feed).await {
                Ok(_) => built += 1,
                Err(e) => error!(feed = %feed, "Initial feed build failed: {e}"),
            }
        }
        info!(built, total = self.slots.len(), "Feed snapshots built");
        built
    }

    fn slot(&self, feed: &str) -> Result<&FeedSlot> {
        self.slots
            .get(feed)
            .ok_or_else(|| FeedError::Validation(format!("unknown feed {feed}")))
    }

    async fn build_and_swap(&self, feed: &str, slot: &FeedSlot) -> Result<Arc<FeedSnapshot>> {
        let snapshot = match self.builder.build(feed).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                error!(feed, "Feed rebuild failed, keeping previous snapshot: {e}");
                return Err(FeedError::Rebuild {
                    feed: feed.to_string(),
                    message: e.to_string(),
                });
            }
        };
        slot.current.store(Some(Arc::clone(&snapshot)));
        Ok(snapshot)
    }
}
