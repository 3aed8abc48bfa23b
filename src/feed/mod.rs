//! Feed snapshots: construction, caching and periodic rebuilds.

pub mod builder;
pub mod cache;
pub mod scheduler;

pub use builder::{sample_batches, FeedBuilder, ForumSource};
pub use cache::FeedCache;
pub use scheduler::RebuildScheduler;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::posts::PostRef;

/// One immutable generation of a feed's ordered references.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub feed: String,
    /// Opaque version marker. A fresh tag is minted for every build.
    pub tag: String,
    pub items: Vec<PostRef>,
    pub built_at: DateTime<Utc>,
}

impl FeedSnapshot {
    #[must_use]
    pub fn new(feed: &str, items: Vec<PostRef>, built_at: DateTime<Utc>) -> Self {
        Self {
            feed: feed.to_string(),
            tag: Uuid::new_v4().simple().to_string(),
            items,
            built_at,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_differ_per_snapshot() {
        let a = FeedSnapshot::new("Fun", vec![], Utc::now());
        let b = FeedSnapshot::new("Fun", vec![], Utc::now());
        assert_ne!(a.tag, b.tag);
        assert_eq!(a.tag.len(), 32);
        assert!(a.is_empty());
    }
}
