//! Weighted batched sampling over forum frontiers.
//!
//! A snapshot is the concatenation of `batches` shuffled batches. In each
//! batch every forum contributes at most its weight in references:
//! recency-style forums hand out their newest not-yet-taken ids, collection
//! forums draw uniformly from their whole id range.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::FeedSnapshot;
use crate::error::{FeedError, Result};
use crate::posts::{IdAllocator, PostRef};
use crate::schema::{RetrievalMode, SchemaRegistry};

pub const DEFAULT_BATCHES: usize = 10;

/// One forum's input to a build, read once at build start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumSource {
    pub forum: String,
    pub mode: RetrievalMode,
    pub weight: u32,
    /// Highest allocated id when the build started.
    pub frontier: i64,
}

/// Run the sampling algorithm over `sources`.
///
/// Collection draws may repeat ids within a batch (collapsed by the batch
/// set) and across batches (kept).
pub fn sample_batches<R: Rng>(
    sources: &[ForumSource],
    batches: usize,
    rng: &mut R,
) -> Vec<PostRef> {
    // Ids still available to recency-style forums, local to this call.
    let mut remaining: HashMap<&str, i64> = sources
        .iter()
        .map(|s| (s.forum.as_str(), s.frontier.max(0)))
        .collect();
    let mut items = Vec::new();

    for _ in 0..batches {
        let mut batch = BTreeSet::new();

        for source in sources {
            let left = remaining.get(source.forum.as_str()).copied().unwrap_or(0);
            let take = left.min(i64::from(source.weight));
            if take <= 0 {
                continue;
            }

            match source.mode {
                RetrievalMode::Collection => {
                    for _ in 0..take {
                        let id = rng.gen_range(1..=source.frontier);
                        batch.insert(PostRef::new(source.forum.clone(), id));
                    }
                }
                RetrievalMode::Recency | RetrievalMode::Mixed => {
                    for id in (left - take + 1..=left).rev() {
                        batch.insert(PostRef::new(source.forum.clone(), id));
                    }
                    remaining.insert(source.forum.as_str(), left - take);
                }
            }
        }

        let mut batch: Vec<PostRef> = batch.into_iter().collect();
        batch.shuffle(rng);
        items.extend(batch);
    }

    items
}

/// Builds snapshots for the feeds declared in the schema.
#[derive(Clone)]
pub struct FeedBuilder {
    schema: Arc<SchemaRegistry>,
    ids: IdAllocator,
    batches: usize,
}

impl FeedBuilder {
    #[must_use]
    pub fn new(schema: Arc<SchemaRegistry>, ids: IdAllocator, batches: usize) -> Self {
        Self {
            schema,
            ids,
            batches,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// Build a fresh snapshot of `feed` with the configured batch count.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for an unknown feed, or a storage
    /// error if a frontier cannot be read.
    pub async fn build(&self, feed: &str) -> Result<FeedSnapshot> {
        self.build_with(feed, self.batches).await
    }

    /// Build a fresh snapshot of `feed` using `batches` batches.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for an unknown feed, or a storage
    /// error if a frontier cannot be read.
    pub async fn build_with(&self, feed: &str, batches: usize) -> Result<FeedSnapshot> {
        let sources = self.sources(feed).await?;
        let items = sample_batches(&sources, batches, &mut rand::thread_rng());
        let snapshot = FeedSnapshot::new(feed, items, Utc::now());
        info!(
            feed,
            tag = %snapshot.tag,
            items = snapshot.items.len(),
            batches,
            "Built feed snapshot"
        );
        Ok(snapshot)
    }

    async fn sources(&self, feed: &str) -> Result<Vec<ForumSource>> {
        let descriptor = self
            .schema
            .feed(feed)
            .ok_or_else(|| FeedError::Validation(format!("unknown feed {feed}")))?;

        let mut sources = Vec::with_capacity(descriptor.weights.len());
        for (forum, weight) in &descriptor.weights {
            let mode = self
                .schema
                .forum(forum)
                .map(|f| f.mode)
                .ok_or_else(|| FeedError::Validation(format!("unknown forum {forum}")))?;
            let frontier = self.ids.frontier(forum).await?;
            debug!(feed, forum = %forum, frontier, weight, mode = mode.as_str(), "Forum frontier");
            sources.push(ForumSource {
                forum: forum.clone(),
                mode,
                weight: *weight,
                frontier,
            });
        }
        Ok(sources)
    }
}
