//! New post submission: id allocation, record write, recency index.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::{FeedError, Result};
use crate::posts::index::HOME_INDEX;
use crate::posts::{
    Awards, IdAllocator, IndexEvictor, NewPost, PostRecord, PostRef, PostStatus, PostStore,
};
use crate::schema::SchemaRegistry;

pub struct Submitter {
    schema: Arc<SchemaRegistry>,
    ids: IdAllocator,
    posts: Arc<PostStore>,
    index: Arc<IndexEvictor>,
    table: String,
}

impl Submitter {
    #[must_use]
    pub fn new(
        schema: Arc<SchemaRegistry>,
        ids: IdAllocator,
        posts: Arc<PostStore>,
        index: Arc<IndexEvictor>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            schema,
            ids,
            posts,
            index,
            table: table.into(),
        }
    }

    /// Store a new post in `forum` and return its reference.
    ///
    /// If the write fails after the id was allocated, that id stays unused.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for an unknown forum or empty title,
    /// [`FeedError::Integrity`] if the new id already has a record, or a
    /// storage error.
    pub async fn submit(&self, forum: &str, post: NewPost) -> Result<PostRef> {
        if self.schema.forum(forum).is_none() {
            return Err(FeedError::Validation(format!("unknown forum {forum}")));
        }
        if post.title.trim().is_empty() {
            return Err(FeedError::Validation("title must not be empty".to_string()));
        }

        let id = self.ids.allocate_checked(&self.table, forum).await?;
        let record = PostRecord {
            forum: forum.to_string(),
            id,
            url: post.url,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
            img: post.img.filter(|s| !s.is_empty()),
            video: post.video.filter(|s| !s.is_empty()),
            width: post.width,
            height: post.height,
            status: PostStatus::Visible,
            created: Utc::now(),
            edited: None,
            views: 0,
            clicks: 0,
            comments: 0,
            awards: Awards::default(),
        };
        self.posts.save(&self.table, &record).await?;

        let post_ref = record.post_ref();
        self.index.append(HOME_INDEX, &post_ref).await?;
        info!(post = %post_ref, "Post submitted");
        Ok(post_ref)
    }

    /// Most recent submissions across all forums, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the index cannot be read.
    pub async fn recent(&self, offset: u64, limit: u64) -> Result<Vec<PostRef>> {
        self.index.recent(HOME_INDEX, offset, limit).await
    }
}
