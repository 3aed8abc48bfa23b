use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visibility state of a post. Hidden is the soft-delete state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Hidden,
    Visible,
    Sponsored,
    Featured,
    Sticky,
    Announced,
}

impl PostStatus {
    #[must_use]
    pub fn as_code(&self) -> i64 {
        match self {
            Self::Hidden => 0,
            Self::Visible => 1,
            Self::Sponsored => 2,
            Self::Featured => 3,
            Self::Sticky => 4,
            Self::Announced => 5,
        }
    }

    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Hidden),
            1 => Some(Self::Visible),
            2 => Some(Self::Sponsored),
            3 => Some(Self::Featured),
            4 => Some(Self::Sticky),
            5 => Some(Self::Announced),
            _ => None,
        }
    }
}

/// Award tally: four independent counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Awards(pub [i64; 4]);

impl Awards {
    pub const DELIMITER: &'static str = ",";

    /// Encode as four integers joined by [`Self::DELIMITER`].
    #[must_use]
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(Self::DELIMITER)
    }

    /// Decode the stored form. Anything but exactly four integers is rejected.
    #[must_use]
    pub fn decode(value: &str) -> Option<Self> {
        let mut tally = [0i64; 4];
        let mut parts = value.split(Self::DELIMITER);
        for slot in &mut tally {
            *slot = parts.next()?.trim().parse().ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(tally))
    }
}

/// Reference to a post, written `forum:id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PostRef {
    pub forum: String,
    pub id: i64,
}

impl PostRef {
    #[must_use]
    pub fn new(forum: impl Into<String>, id: i64) -> Self {
        Self {
            forum: forum.into(),
            id,
        }
    }
}

impl fmt::Display for PostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.forum, self.id)
    }
}

impl FromStr for PostRef {
    type Err = String;

    // Split on the last colon; forum names may contain spaces but ids never contain ':'.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (forum, id) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("missing ':' in post reference {s:?}"))?;
        if forum.is_empty() {
            return Err(format!("empty forum in post reference {s:?}"));
        }
        let id = id
            .parse()
            .map_err(|_| format!("bad id in post reference {s:?}"))?;
        Ok(Self::new(forum, id))
    }
}

impl From<PostRef> for String {
    fn from(value: PostRef) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PostRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A stored post with all fixed and tracked fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub forum: String,
    pub id: i64,
    pub url: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub img: Option<String>,
    pub video: Option<String>,
    pub width: i64,
    pub height: i64,
    pub status: PostStatus,
    pub created: DateTime<Utc>,
    pub edited: Option<DateTime<Utc>>,
    pub views: i64,
    pub clicks: i64,
    pub comments: i64,
    pub awards: Awards,
}

impl PostRecord {
    #[must_use]
    pub fn post_ref(&self) -> PostRef {
        PostRef::new(self.forum.clone(), self.id)
    }
}

/// Reduced projection served to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPost {
    pub forum: String,
    pub id: i64,
    pub url: String,
    pub title: String,
    pub content: String,
    pub img: Option<String>,
    pub video: Option<String>,
    pub width: i64,
    pub height: i64,
    pub status: PostStatus,
    pub created: DateTime<Utc>,
    pub edited: Option<DateTime<Utc>>,
    pub views: i64,
    pub comments: i64,
    pub awards: Awards,
}

impl From<PostRecord> for DisplayPost {
    fn from(record: PostRecord) -> Self {
        Self {
            forum: record.forum,
            id: record.id,
            url: record.url,
            title: record.title,
            content: record.content,
            img: record.img,
            video: record.video,
            width: record.width,
            height: record.height,
            status: record.status,
            created: record.created,
            edited: record.edited,
            views: record.views,
            comments: record.comments,
            awards: record.awards,
        }
    }
}

/// Submission payload for a new post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub url: String,
    pub author_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub img: Option<String>,
    pub video: Option<String>,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

/// Tracked counters that readers bump in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedCounter {
    Views,
    Clicks,
    Comments,
}

impl TrackedCounter {
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Clicks => "clicks",
            Self::Comments => "comments",
        }
    }
}
