//! End-to-end tests: submission, snapshot rebuilds and cursor pagination.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use forumfeed::config::Config;
use forumfeed::error::{FeedError, StoreError};
use forumfeed::posts::{NewPost, PostStatus};
use forumfeed::schema::SchemaRegistry;
use forumfeed::service::FeedService;
use forumfeed::store::{KvStore, MemoryStore, StoreResult};

const SCHEMA: &str = r#"
    [[forum]]
    name = "World News"
    mode = "recency"
    feed = "News"

    [[forum]]
    name = "Funny"
    mode = "collection"
    feed = "Fun"

    [[forum]]
    name = "Ask"
    mode = "collection"
    feed = "Fun"

    [[forum]]
    name = "Cute"
    mode = "collection"
    feed = "Fun"

    [[forum]]
    name = "Forum Games"
    mode = "collection"
    feed = "Fun"

    [[forum]]
    name = "Cosplay"
    mode = "collection"
    feed = "Fun"

    [[forum]]
    name = "Archive"
    mode = "recency"
    feed = "Backlog"

    [[feed]]
    name = "News"
    weights = { "World News" = 24 }

    [[feed]]
    name = "Backlog"
    weights = { Archive = 30 }

    [[feed]]
    name = "Fun"
    weights = { Funny = 45, Ask = 15, Cute = 15, "Forum Games" = 15, Cosplay = 10 }
"#;

/// Memory store whose operations can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
    failing_saves: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Other("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.check()?;
        self.inner.incr(key).await
    }
    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        self.check()?;
        self.inner.get_int(key).await
    }
    async fn hreplace(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        self.check()?;
        if self.failing_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Other("write rejected".to_string()));
        }
        self.inner.hreplace(key, fields).await
    }
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.check()?;
        self.inner.hset(key, field, value).await
    }
    async fn hget_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.check()?;
        self.inner.hget_all(key).await
    }
    async fn hexists(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.hexists(key).await
    }
    async fn hincr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        self.check()?;
        self.inner.hincr(key, field, delta).await
    }
    async fn zadd(&self, key: &str, member: &str, score: i64) -> StoreResult<()> {
        self.check()?;
        self.inner.zadd(key, member, score).await
    }
    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        self.check()?;
        self.inner.zcard(key).await
    }
    async fn zrange(&self, key: &str, start: u64, count: u64) -> StoreResult<Vec<(String, i64)>> {
        self.check()?;
        self.inner.zrange(key, start, count).await
    }
    async fn zrevrange(
        &self,
        key: &str,
        start: u64,
        count: u64,
    ) -> StoreResult<Vec<(String, i64)>> {
        self.check()?;
        self.inner.zrevrange(key, start, count).await
    }
    async fn zpopmin(&self, key: &str, count: u64) -> StoreResult<Vec<(String, i64)>> {
        self.check()?;
        self.inner.zpopmin(key, count).await
    }
}

fn test_config() -> Config {
    Config {
        database_path: ":memory:".into(),
        post_table: "post".to_string(),
        schema_path: "./schema.toml".into(),
        rebuild_interval: std::time::Duration::from_secs(15),
        feed_batches: 10,
        index_capacity: 25_000,
        index_purge_interval: 100,
        default_page_size: 20,
        web_host: "127.0.0.1".to_string(),
        web_port: 0,
    }
}

fn service_with(store: Arc<dyn KvStore>) -> FeedService {
    let schema = Arc::new(SchemaRegistry::from_toml(SCHEMA).unwrap());
    FeedService::new(&test_config(), schema, store)
}

fn new_post(title: &str) -> NewPost {
    NewPost {
        author_id: "u-1".to_string(),
        title: title.to_string(),
        content: "body".to_string(),
        ..NewPost::default()
    }
}

async fn submit_many(service: &FeedService, forum: &str, count: usize) {
    for n in 0..count {
        service
            .submitter
            .submit(forum, new_post(&format!("{forum} #{n}")))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_world_news_recency_build() {
    let service = service_with(Arc::new(MemoryStore::new()));
    submit_many(&service, "World News", 23).await;

    let snapshot = service.build_feed("News", 10).await.unwrap();
    assert_eq!(snapshot.len(), 23);
    let ids: HashSet<i64> = snapshot.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=23).collect::<HashSet<i64>>());
}

#[tokio::test]
async fn test_fun_feed_single_post_per_forum() {
    let service = service_with(Arc::new(MemoryStore::new()));
    for forum in ["Funny", "Ask", "Cute", "Forum Games", "Cosplay"] {
        submit_many(&service, forum, 1).await;
    }

    let snapshot = service.build_feed("Fun", 10).await.unwrap();
    assert_eq!(snapshot.len(), 50);
    for forum in ["Funny", "Ask", "Cute", "Forum Games", "Cosplay"] {
        let hits = snapshot
            .items
            .iter()
            .filter(|r| r.forum == forum && r.id == 1)
            .count();
        assert_eq!(hits, 10, "forum {forum}");
    }
}

#[tokio::test]
async fn test_empty_feed_builds_empty_snapshot() {
    let service = service_with(Arc::new(MemoryStore::new()));
    let snapshot = service.cache.rebuild("News").await.unwrap();
    assert!(snapshot.is_empty());

    let page = service
        .resolve_page("News", Some(&snapshot.tag), 0, 10)
        .await
        .unwrap();
    assert_eq!((page.start, page.end), (0, -1));
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_pagination_follows_tag() {
    let service = service_with(Arc::new(MemoryStore::new()));
    submit_many(&service, "World News", 23).await;
    service.cache.rebuild("News").await.unwrap();

    let first = service.resolve_page("News", None, 15, 10).await.unwrap();
    assert_eq!((first.start, first.end), (0, 9));
    assert_eq!(first.items.len(), 10);

    let second = service
        .resolve_page("News", Some(&first.tag), 10, 10)
        .await
        .unwrap();
    assert_eq!(second.tag, first.tag);
    assert_eq!((second.start, second.end), (10, 19));

    let last = service
        .resolve_page("News", Some(&first.tag), 20, 10)
        .await
        .unwrap();
    assert_eq!((last.start, last.end), (20, 22));
    assert_eq!(last.items.len(), 3);

    let beyond = service
        .resolve_page("News", Some(&first.tag), 40, 10)
        .await
        .unwrap();
    assert!(beyond.end < beyond.start);
    assert!(beyond.items.is_empty());

    // Pages 1-3 under one tag cover the snapshot exactly once.
    let seen: HashSet<i64> = first
        .items
        .iter()
        .chain(&second.items)
        .chain(&last.items)
        .map(|p| p.id)
        .collect();
    assert_eq!(seen.len(), 23);
}

#[tokio::test]
async fn test_page_larger_than_http_limit() {
    let service = service_with(Arc::new(MemoryStore::new()));
    submit_many(&service, "Archive", 250).await;
    let snapshot = service.cache.rebuild("Backlog").await.unwrap();
    assert_eq!(snapshot.len(), 250);

    let page = service
        .resolve_page("Backlog", Some(&snapshot.tag), 0, 200)
        .await
        .unwrap();
    assert_eq!((page.start, page.end), (0, 199));
    assert_eq!(page.items.len(), 200);

    let rest = service
        .resolve_page("Backlog", Some(&snapshot.tag), 200, 200)
        .await
        .unwrap();
    assert_eq!((rest.start, rest.end), (200, 249));
    assert_eq!(rest.items.len(), 50);
}

#[tokio::test]
async fn test_rebuild_resets_stale_cursor() {
    let service = service_with(Arc::new(MemoryStore::new()));
    submit_many(&service, "World News", 23).await;
    service.cache.rebuild("News").await.unwrap();

    let page = service.resolve_page("News", None, 0, 10).await.unwrap();
    let new_snapshot = service.cache.rebuild("News").await.unwrap();
    assert_ne!(new_snapshot.tag, page.tag);

    let next = service
        .resolve_page("News", Some(&page.tag), 10, 10)
        .await
        .unwrap();
    assert_eq!(next.start, 0);
    assert_eq!(next.tag, new_snapshot.tag);
}

#[tokio::test]
async fn test_hidden_posts_dropped_from_page() {
    let service = service_with(Arc::new(MemoryStore::new()));
    submit_many(&service, "World News", 5).await;
    let snapshot = service.cache.rebuild("News").await.unwrap();

    service
        .posts
        .set_status("post", "World News", 3, PostStatus::Hidden)
        .await
        .unwrap();

    let page = service
        .resolve_page("News", Some(&snapshot.tag), 0, 10)
        .await
        .unwrap();
    assert_eq!((page.start, page.end), (0, 4));
    assert_eq!(page.items.len(), 4);
    assert!(page.items.iter().all(|p| p.id != 3));

    // Remaining items keep snapshot order.
    let expected: Vec<i64> = snapshot
        .items
        .iter()
        .map(|r| r.id)
        .filter(|id| *id != 3)
        .collect();
    let got: Vec<i64> = page.items.iter().map(|p| p.id).collect();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn test_invalid_cursor_rejected() {
    let service = service_with(Arc::new(MemoryStore::new()));
    service.cache.rebuild("News").await.unwrap();

    assert!(matches!(
        service.resolve_page("News", None, -1, 10).await,
        Err(FeedError::Validation(_))
    ));
    assert!(matches!(
        service.resolve_page("News", None, 0, 0).await,
        Err(FeedError::Validation(_))
    ));
    assert!(matches!(
        service.resolve_page("Sports", None, 0, 10).await,
        Err(FeedError::Validation(_))
    ));
}

#[tokio::test]
async fn test_page_before_first_build_not_found() {
    let service = service_with(Arc::new(MemoryStore::new()));
    assert!(matches!(
        service.resolve_page("News", None, 0, 10).await,
        Err(FeedError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_snapshot() {
    let store = Arc::new(FlakyStore::default());
    let service = service_with(store.clone());
    submit_many(&service, "World News", 4).await;

    let good = service.cache.rebuild("News").await.unwrap();

    store.failing.store(true, Ordering::SeqCst);
    let err = service.cache.rebuild("News").await.unwrap_err();
    assert!(matches!(err, FeedError::Rebuild { .. }));
    assert_eq!(service.get_snapshot("News").unwrap().tag, good.tag);

    // Page resolution surfaces the store failure instead of hiding it.
    assert!(matches!(
        service.resolve_page("News", Some(&good.tag), 0, 10).await,
        Err(FeedError::Storage(_))
    ));

    store.failing.store(false, Ordering::SeqCst);
    let recovered = service.cache.rebuild("News").await.unwrap();
    assert_ne!(recovered.tag, good.tag);
}

#[tokio::test]
async fn test_failed_save_skips_id() {
    let store = Arc::new(FlakyStore::default());
    let service = service_with(store.clone());

    store.failing_saves.store(true, Ordering::SeqCst);
    assert!(matches!(
        service.submitter.submit("Ask", new_post("lost")).await,
        Err(FeedError::Storage(_))
    ));
    store.failing_saves.store(false, Ordering::SeqCst);

    let posted = service.submitter.submit("Ask", new_post("kept")).await.unwrap();
    assert_eq!(posted.id, 2);
    assert!(service.load_record("Ask", 1).await.unwrap().is_none());
    assert!(service.load_record("Ask", 2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_submit_unknown_forum_rejected() {
    let service = service_with(Arc::new(MemoryStore::new()));
    assert!(matches!(
        service.submitter.submit("Nowhere", new_post("x")).await,
        Err(FeedError::Validation(_))
    ));
    assert!(matches!(
        service.submitter.submit("Ask", new_post("   ")).await,
        Err(FeedError::Validation(_))
    ));
}

#[tokio::test]
async fn test_recent_index_newest_first() {
    let service = service_with(Arc::new(MemoryStore::new()));
    submit_many(&service, "World News", 3).await;
    submit_many(&service, "Ask", 1).await;

    let recent = service.submitter.recent(0, 10).await.unwrap();
    assert_eq!(recent.len(), 4);
    // Scored by per-forum id, so World News:3 outranks Ask:1.
    assert_eq!(recent[0].to_string(), "World News:3");
}

#[tokio::test]
async fn test_reads_during_rebuilds_stay_consistent() {
    let service = service_with(Arc::new(MemoryStore::new()));
    submit_many(&service, "World News", 23).await;
    service.cache.rebuild("News").await.unwrap();

    let rebuilder = {
        let service = service.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                service.cache.rebuild("News").await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..50 {
        let page = service.resolve_page("News", None, 0, 30).await.unwrap();
        assert_eq!(page.items.len(), 23);
        tokio::task::yield_now().await;
    }
    rebuilder.await.unwrap();
}
