//! The feed core wired together, as handed to request handlers and the
//! rebuild scheduler.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::feed::{FeedBuilder, FeedCache, FeedSnapshot, RebuildScheduler};
use crate::pagination::{Page, Paginator};
use crate::posts::{
    Awards, IdAllocator, IndexEvictor, PostRecord, PostRef, PostStatus, PostStore, TrackedCounter,
};
use crate::schema::SchemaRegistry;
use crate::store::SharedStore;
use crate::submission::Submitter;

#[derive(Clone)]
pub struct FeedService {
    pub schema: Arc<SchemaRegistry>,
    pub builder: FeedBuilder,
    pub cache: Arc<FeedCache>,
    pub paginator: Arc<Paginator>,
    pub posts: Arc<PostStore>,
    pub index: Arc<IndexEvictor>,
    pub submitter: Arc<Submitter>,
    ids: IdAllocator,
    table: String,
    default_page_size: usize,
}

impl FeedService {
    #[must_use]
    pub fn new(config: &Config, schema: Arc<SchemaRegistry>, store: SharedStore) -> Self {
        let ids = IdAllocator::new(Arc::clone(&store));
        let builder = FeedBuilder::new(Arc::clone(&schema), ids.clone(), config.feed_batches);
        let cache = Arc::new(FeedCache::new(builder.clone()));
        let posts = Arc::new(PostStore::new(Arc::clone(&store)));
        let index = Arc::new(IndexEvictor::new(
            store,
            config.index_capacity,
            config.index_purge_interval,
        ));
        let paginator = Arc::new(Paginator::new(
            Arc::clone(&cache),
            Arc::clone(&posts),
            config.post_table.clone(),
        ));
        let submitter = Arc::new(Submitter::new(
            Arc::clone(&schema),
            ids.clone(),
            Arc::clone(&posts),
            Arc::clone(&index),
            config.post_table.clone(),
        ));

        Self {
            schema,
            builder,
            cache,
            paginator,
            posts,
            index,
            submitter,
            ids,
            table: config.post_table.clone(),
            default_page_size: config.default_page_size,
        }
    }

    #[must_use]
    pub fn scheduler(&self, config: &Config) -> RebuildScheduler {
        RebuildScheduler::new(Arc::clone(&self.cache), config.rebuild_interval)
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Build a snapshot of `feed` without publishing it.
    ///
    /// # Errors
    ///
    /// See [`FeedBuilder::build_with`].
    pub async fn build_feed(&self, feed: &str, batches: usize) -> Result<FeedSnapshot> {
        self.builder.build_with(feed, batches).await
    }

    /// # Errors
    ///
    /// See [`FeedCache::get_current`].
    pub fn get_snapshot(&self, feed: &str) -> Result<Arc<FeedSnapshot>> {
        self.cache.get_current(feed)
    }

    /// # Errors
    ///
    /// See [`Paginator::resolve`].
    pub async fn resolve_page(
        &self,
        feed: &str,
        tag: Option<&str>,
        position: i64,
        page_size: usize,
    ) -> Result<Page> {
        self.paginator.resolve(feed, tag, position, page_size).await
    }

    /// # Errors
    ///
    /// See [`IdAllocator::allocate_checked`].
    pub async fn allocate_post_id(&self, forum: &str) -> Result<i64> {
        self.ids.allocate_checked(&self.table, forum).await
    }

    /// # Errors
    ///
    /// See [`PostStore::save`].
    pub async fn save_record(&self, record: &PostRecord) -> Result<()> {
        self.posts.save(&self.table, record).await
    }

    /// # Errors
    ///
    /// See [`PostStore::load`].
    pub async fn load_record(&self, forum: &str, id: i64) -> Result<Option<PostRecord>> {
        self.posts.load(&self.table, forum, id).await
    }

    /// # Errors
    ///
    /// See [`PostStore::set_status`].
    pub async fn set_post_status(&self, forum: &str, id: i64, status: PostStatus) -> Result<()> {
        self.posts.set_status(&self.table, forum, id, status).await
    }

    /// # Errors
    ///
    /// See [`PostStore::track`].
    pub async fn track_post(&self, forum: &str, id: i64, counter: TrackedCounter) -> Result<i64> {
        self.posts.track(&self.table, forum, id, counter).await
    }

    /// # Errors
    ///
    /// See [`PostStore::add_award`].
    pub async fn award_post(&self, forum: &str, id: i64, slot: usize) -> Result<Awards> {
        self.posts.add_award(&self.table, forum, id, slot).await
    }

    /// # Errors
    ///
    /// See [`IndexEvictor::append`].
    pub async fn index_append(&self, index: &str, post: &PostRef) -> Result<u64> {
        self.index.append(index, post).await
    }
}
