//! Forum and feed schema registry.
//!
//! The registry is loaded once at startup from TOML and is read-only
//! afterwards. Every forum names the feed it belongs to and its retrieval
//! mode; every feed maps forum names to integer weights.
//!
//! ```toml
//! [[forum]]
//! name = "Funny"
//! mode = "collection"
//! feed = "Fun"
//!
//! [[feed]]
//! name = "Fun"
//! weights = { Funny = 45 }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse schema: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate forum name: {0}")]
    DuplicateForum(String),
    #[error("duplicate feed name: {0}")]
    DuplicateFeed(String),
    #[error("forum {forum} references unknown feed {feed}")]
    UnknownParentFeed { forum: String, feed: String },
    #[error("feed {feed} weights unknown forum {forum}")]
    UnknownWeightedForum { feed: String, forum: String },
    #[error("feed {feed} gives forum {forum} a weight of zero")]
    ZeroWeight { feed: String, forum: String },
}

/// How the feed builder picks ids from a forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Newest ids first, counting down from the frontier.
    Recency,
    /// Uniform draws over the whole id range.
    Collection,
    /// Sampled like `Recency`.
    Mixed,
}

impl RetrievalMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recency => "recency",
            Self::Collection => "collection",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForumDescriptor {
    pub name: String,
    pub mode: RetrievalMode,
    /// Parent feed name.
    pub feed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedDescriptor {
    pub name: String,
    /// Forum name to weight. Conventionally sums near 100.
    pub weights: BTreeMap<String, u32>,
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default, rename = "forum")]
    forums: Vec<ForumDescriptor>,
    #[serde(default, rename = "feed")]
    feeds: Vec<FeedDescriptor>,
}

/// Immutable forum/feed lookup tables.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    forums: HashMap<String, ForumDescriptor>,
    feeds: HashMap<String, FeedDescriptor>,
    /// Feed names in declaration order, used for rebuild rotation.
    feed_order: Vec<String>,
}

impl SchemaRegistry {
    /// Load and validate a schema file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate a schema from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML, duplicate names, or dangling references.
    pub fn from_toml(text: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = toml::from_str(text)?;
        Self::new(file.forums, file.feeds)
    }

    /// Build a registry from descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names, forums pointing at unknown feeds,
    /// feeds weighting unknown forums, or zero weights.
    pub fn new(
        forums: Vec<ForumDescriptor>,
        feeds: Vec<FeedDescriptor>,
    ) -> Result<Self, SchemaError> {
        let mut feed_map = HashMap::with_capacity(feeds.len());
        let mut feed_order = Vec::with_capacity(feeds.len());
        for feed in feeds {
            if feed_map.contains_key(&feed.name) {
                return Err(SchemaError::DuplicateFeed(feed.name));
            }
            feed_order.push(feed.name.clone());
            feed_map.insert(feed.name.clone(), feed);
        }

        let mut forum_map = HashMap::with_capacity(forums.len());
        for forum in forums {
            if forum_map.contains_key(&forum.name) {
                return Err(SchemaError::DuplicateForum(forum.name));
            }
            if !feed_map.contains_key(&forum.feed) {
                return Err(SchemaError::UnknownParentFeed {
                    forum: forum.name,
                    feed: forum.feed,
                });
            }
            forum_map.insert(forum.name.clone(), forum);
        }

        for feed in feed_map.values() {
            for (forum, weight) in &feed.weights {
                if !forum_map.contains_key(forum) {
                    return Err(SchemaError::UnknownWeightedForum {
                        feed: feed.name.clone(),
                        forum: forum.clone(),
                    });
                }
                if *weight == 0 {
                    return Err(SchemaError::ZeroWeight {
                        feed: feed.name.clone(),
                        forum: forum.clone(),
                    });
                }
            }
        }

        Ok(Self {
            forums: forum_map,
            feeds: feed_map,
            feed_order,
        })
    }

    #[must_use]
    pub fn forum(&self, name: &str) -> Option<&ForumDescriptor> {
        self.forums.get(name)
    }

    #[must_use]
    pub fn feed(&self, name: &str) -> Option<&FeedDescriptor> {
        self.feeds.get(name)
    }

    /// Feed names in the order they were declared.
    #[must_use]
    pub fn feed_names(&self) -> &[String] {
        &self.feed_order
    }

    #[must_use]
    pub fn forum_count(&self) -> usize {
        self.forums.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUN: &str = r#"
        [[forum]]
        name = "Funny"
        mode = "collection"
        feed = "Fun"

        [[forum]]
        name = "Forum Games"
        mode = "recency"
        feed = "Fun"

        [[feed]]
        name = "Fun"
        weights = { Funny = 45, "Forum Games" = 15 }
    "#;

    #[test]
    fn test_parse_schema() {
        let registry = SchemaRegistry::from_toml(FUN).unwrap();
        assert_eq!(registry.forum_count(), 2);
        assert_eq!(
            registry.forum("Funny").unwrap().mode,
            RetrievalMode::Collection
        );
        assert_eq!(registry.feed("Fun").unwrap().weights["Forum Games"], 15);
        assert_eq!(registry.feed_names(), ["Fun".to_string()]);
        assert!(registry.forum("Nope").is_none());
        assert!(registry.feed("Nope").is_none());
    }

    #[test]
    fn test_duplicate_forum_rejected() {
        let text = r#"
            [[forum]]
            name = "Ask"
            mode = "mixed"
            feed = "Main"

            [[forum]]
            name = "Ask"
            mode = "recency"
            feed = "Main"

            [[feed]]
            name = "Main"
            weights = { Ask = 10 }
        "#;
        assert!(matches!(
            SchemaRegistry::from_toml(text),
            Err(SchemaError::DuplicateForum(name)) if name == "Ask"
        ));
    }

    #[test]
    fn test_unknown_parent_feed_rejected() {
        let text = r#"
            [[forum]]
            name = "Ask"
            mode = "mixed"
            feed = "Missing"
        "#;
        assert!(matches!(
            SchemaRegistry::from_toml(text),
            Err(SchemaError::UnknownParentFeed { .. })
        ));
    }

    #[test]
    fn test_unknown_weighted_forum_rejected() {
        let text = r#"
            [[feed]]
            name = "Main"
            weights = { Ghost = 10 }
        "#;
        assert!(matches!(
            SchemaRegistry::from_toml(text),
            Err(SchemaError::UnknownWeightedForum { .. })
        ));
    }

    #[test]
    fn test_zero_weight_rejected() {
        let text = r#"
            [[forum]]
            name = "Ask"
            mode = "recency"
            feed = "Main"

            [[feed]]
            name = "Main"
            weights = { Ask = 0 }
        "#;
        assert!(matches!(
            SchemaRegistry::from_toml(text),
            Err(SchemaError::ZeroWeight { .. })
        ));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let text = r#"
            [[forum]]
            name = "Ask"
            mode = "random"
            feed = "Main"
        "#;
        assert!(matches!(
            SchemaRegistry::from_toml(text),
            Err(SchemaError::Parse(_))
        ));
    }
}
