//! Post records as flat field maps keyed by `{table}:{forum}:{id}`.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

use super::locks::KeyedLocks;
use super::model::{Awards, DisplayPost, PostRecord, PostStatus, TrackedCounter};
use crate::error::{FeedError, Result};
use crate::store::SharedStore;

/// Key of a post's field map.
#[must_use]
pub fn record_key(table: &str, forum: &str, id: i64) -> String {
    format!("{table}:{forum}:{id}")
}

pub struct PostStore {
    store: SharedStore,
    award_locks: KeyedLocks,
}

impl PostStore {
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            award_locks: KeyedLocks::new(),
        }
    }

    /// Write every fixed and tracked field of `record`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn save(&self, table: &str, record: &PostRecord) -> Result<()> {
        let key = record_key(table, &record.forum, record.id);
        self.store.hreplace(&key, &encode(record)).await?;
        debug!(%key, "Saved post record");
        Ok(())
    }

    /// Read a record back. `Ok(None)` when nothing is stored under the key.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails, or [`FeedError::Corrupt`] if
    /// the stored fields cannot be decoded.
    pub async fn load(&self, table: &str, forum: &str, id: i64) -> Result<Option<PostRecord>> {
        let key = record_key(table, forum, id);
        let fields = self.store.hget_all(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode(&key, &fields).map(Some)
    }

    /// Load the reader-facing projection.
    ///
    /// Missing, hidden and undecodable records all come back as `Ok(None)` so
    /// a page can drop them and keep going. Only store failures are errors.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub async fn load_for_display(
        &self,
        table: &str,
        forum: &str,
        id: i64,
    ) -> Result<Option<DisplayPost>> {
        match self.load(table, forum, id).await {
            Ok(Some(record)) if record.status == PostStatus::Hidden => Ok(None),
            Ok(Some(record)) => Ok(Some(record.into())),
            Ok(None) => Ok(None),
            Err(FeedError::Corrupt { key, message }) => {
                warn!(%key, %message, "Dropping undecodable post from display");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Bump a tracked counter in place and return its new value.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::NotFound`] if the post does not exist, or a storage
    /// error if the update fails.
    pub async fn track(
        &self,
        table: &str,
        forum: &str,
        id: i64,
        counter: TrackedCounter,
    ) -> Result<i64> {
        let key = self.existing_key(table, forum, id).await?;
        Ok(self.store.hincr(&key, counter.field(), 1).await?)
    }

    /// Change a post's status. Setting [`PostStatus::Hidden`] soft-deletes it.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::NotFound`] if the post does not exist, or a storage
    /// error if the update fails.
    pub async fn set_status(
        &self,
        table: &str,
        forum: &str,
        id: i64,
        status: PostStatus,
    ) -> Result<()> {
        let key = self.existing_key(table, forum, id).await?;
        self.store
            .hset(&key, "status", &status.as_code().to_string())
            .await?;
        Ok(())
    }

    /// Add one to award slot `slot` (0..4) and return the updated tally.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for a slot outside 0..4,
    /// [`FeedError::NotFound`] for a missing post, or a storage error.
    pub async fn add_award(
        &self,
        table: &str,
        forum: &str,
        id: i64,
        slot: usize,
    ) -> Result<Awards> {
        if slot >= 4 {
            return Err(FeedError::Validation(format!("award slot {slot} out of range")));
        }
        let key = record_key(table, forum, id);
        let _guard = self.award_locks.lock(&key).await;

        let fields = self.store.hget_all(&key).await?;
        if fields.is_empty() {
            return Err(FeedError::NotFound(format!("post {forum}:{id}")));
        }
        let mut awards = Awards::decode(field(&key, &fields, "awards")?)
            .ok_or_else(|| FeedError::corrupt(&key, "awards is not four integers"))?;
        awards.0[slot] += 1;
        self.store.hset(&key, "awards", &awards.encode()).await?;
        Ok(awards)
    }

    async fn existing_key(&self, table: &str, forum: &str, id: i64) -> Result<String> {
        let key = record_key(table, forum, id);
        if !self.store.hexists(&key).await? {
            return Err(FeedError::NotFound(format!("post {forum}:{id}")));
        }
        Ok(key)
    }
}

// Absent media fields are left out of the map, so `Some("")` and `None`
// stay distinct.
fn encode(record: &PostRecord) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("forum", record.forum.clone()),
        ("id", record.id.to_string()),
        ("url", record.url.clone()),
        ("authorId", record.author_id.clone()),
        ("title", record.title.clone()),
        ("content", record.content.clone()),
        ("w", record.width.to_string()),
        ("h", record.height.to_string()),
        ("status", record.status.as_code().to_string()),
        ("created", record.created.timestamp_millis().to_string()),
        (
            "edited",
            record
                .edited
                .map(|t| t.timestamp_millis().to_string())
                .unwrap_or_default(),
        ),
        ("views", record.views.to_string()),
        ("clicks", record.clicks.to_string()),
        ("comments", record.comments.to_string()),
        ("awards", record.awards.encode()),
    ];
    if let Some(img) = &record.img {
        fields.push(("img", img.clone()));
    }
    if let Some(video) = &record.video {
        fields.push(("video", video.clone()));
    }
    fields
}

fn decode(key: &str, fields: &HashMap<String, String>) -> Result<PostRecord> {
    let status_code = int(key, fields, "status")?;
    let status = PostStatus::from_code(status_code)
        .ok_or_else(|| FeedError::corrupt(key, format!("unknown status {status_code}")))?;
    let awards = Awards::decode(field(key, fields, "awards")?)
        .ok_or_else(|| FeedError::corrupt(key, "awards is not four integers"))?;
    let edited = match field(key, fields, "edited")? {
        "" => None,
        _ => Some(timestamp(key, int(key, fields, "edited")?)?),
    };

    Ok(PostRecord {
        forum: field(key, fields, "forum")?.to_string(),
        id: int(key, fields, "id")?,
        url: field(key, fields, "url")?.to_string(),
        author_id: field(key, fields, "authorId")?.to_string(),
        title: field(key, fields, "title")?.to_string(),
        content: field(key, fields, "content")?.to_string(),
        img: fields.get("img").cloned(),
        video: fields.get("video").cloned(),
        width: int(key, fields, "w")?,
        height: int(key, fields, "h")?,
        status,
        created: timestamp(key, int(key, fields, "created")?)?,
        edited,
        views: int(key, fields, "views")?,
        clicks: int(key, fields, "clicks")?,
        comments: int(key, fields, "comments")?,
        awards,
    })
}

fn field<'a>(key: &str, fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| FeedError::corrupt(key, format!("missing field {name}")))
}

fn int(key: &str, fields: &HashMap<String, String>, name: &str) -> Result<i64> {
    let value = field(key, fields, name)?;
    value
        .trim()
        .parse()
        .map_err(|_| FeedError::corrupt(key, format!("field {name} is not a number: {value:?}")))
}

fn timestamp(key: &str, millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| FeedError::corrupt(key, format!("timestamp {millis} out of range")))
}
