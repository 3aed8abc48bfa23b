//! Cursor pagination over the current feed snapshot.
//!
//! A cursor is the `(tag, position)` pair returned with every page. The
//! position is honoured only while the tag still names the serving
//! snapshot; after a rebuild the client is sent back to the start.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;

use crate::error::{FeedError, Result};
use crate::feed::FeedCache;
use crate::posts::{DisplayPost, PostStore};

pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Largest page the HTTP API will ask for.
pub const MAX_PAGE_SIZE: usize = 100;

/// One resolved page.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Tag to echo on the next request.
    pub tag: String,
    pub start: i64,
    /// Inclusive. Less than `start` when the page is past the end.
    pub end: i64,
    pub items: Vec<DisplayPost>,
}

/// Resolve `[start, end]` from a cursor and the snapshot length.
///
/// Returns `(start, end)`; `end < start` means nothing to serve.
#[must_use]
pub fn page_bounds(tag_matches: bool, position: i64, page_size: usize, len: usize) -> (i64, i64) {
    let start = if tag_matches { position } else { 0 };
    let end = start
        .saturating_add(page_size as i64 - 1)
        .min(len as i64 - 1);
    (start, end)
}

pub struct Paginator {
    cache: Arc<FeedCache>,
    posts: Arc<PostStore>,
    table: String,
}

impl Paginator {
    #[must_use]
    pub fn new(cache: Arc<FeedCache>, posts: Arc<PostStore>, table: impl Into<String>) -> Self {
        Self {
            cache,
            posts,
            table: table.into(),
        }
    }

    /// Resolve a page of `feed` for the client cursor `(client_tag, position)`.
    ///
    /// Posts that no longer resolve (missing, hidden, undecodable) are
    /// dropped, so a page can be shorter than `end - start + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for a negative position, a zero page
    /// size or an unknown feed, [`FeedError::NotFound`] if the feed has no
    /// snapshot yet, or a storage error if a post read fails.
    pub async fn resolve(
        &self,
        feed: &str,
        client_tag: Option<&str>,
        position: i64,
        page_size: usize,
    ) -> Result<Page> {
        if position < 0 {
            return Err(FeedError::Validation(format!(
                "cursor position must not be negative, got {position}"
            )));
        }
        if page_size == 0 {
            return Err(FeedError::Validation("page size must be at least 1".to_string()));
        }

        let snapshot = self.cache.get_current(feed)?;
        let tag_matches = client_tag == Some(snapshot.tag.as_str());
        let (start, end) = page_bounds(tag_matches, position, page_size, snapshot.len());

        let items = if end < start {
            Vec::new()
        } else {
            let refs = &snapshot.items[start as usize..=end as usize];
            let loads = refs
                .iter()
                .map(|r| self.posts.load_for_display(&self.table, &r.forum, r.id));
            try_join_all(loads).await?.into_iter().flatten().collect()
        };

        Ok(Page {
            tag: snapshot.tag.clone(),
            start,
            end,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_tag_keeps_position() {
        assert_eq!(page_bounds(true, 20, 10, 50), (20, 29));
    }

    #[test]
    fn test_mismatched_tag_resets() {
        assert_eq!(page_bounds(false, 20, 10, 50), (0, 9));
    }

    #[test]
    fn test_end_clamped_to_length() {
        assert_eq!(page_bounds(true, 45, 10, 50), (45, 49));
    }

    #[test]
    fn test_large_page_spans_requested_size() {
        assert_eq!(page_bounds(true, 0, 200, 250), (0, 199));
        assert_eq!(page_bounds(true, 100, 200, 250), (100, 249));
    }

    #[test]
    fn test_past_end_is_empty() {
        let (start, end) = page_bounds(true, 60, 10, 50);
        assert_eq!(start, 60);
        assert!(end < start);

        let (start, end) = page_bounds(false, 0, 10, 0);
        assert_eq!((start, end), (0, -1));
    }
}
