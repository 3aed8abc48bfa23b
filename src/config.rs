use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::feed::builder::DEFAULT_BATCHES;
use crate::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::posts::index::{DEFAULT_CAPACITY, DEFAULT_PURGE_INTERVAL};
use crate::posts::DEFAULT_TABLE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_path: PathBuf,
    pub post_table: String,

    // Schema
    pub schema_path: PathBuf,

    // Feed building
    pub rebuild_interval: Duration,
    pub feed_batches: usize,

    // Recency index
    pub index_capacity: u64,
    pub index_purge_interval: i64,

    // Pagination
    pub default_page_size: usize,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Storage
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/forumfeed.sqlite",
            )),
            post_table: env_or_default("POST_TABLE", DEFAULT_TABLE),

            // Schema
            schema_path: PathBuf::from(env_or_default("SCHEMA_PATH", "./schema.toml")),

            // Feed building
            rebuild_interval: Duration::from_secs(parse_env_u64("REBUILD_INTERVAL_SECS", 15)?),
            feed_batches: parse_env_usize("FEED_BATCHES", DEFAULT_BATCHES)?,

            // Recency index
            index_capacity: parse_env_u64("INDEX_CAPACITY", DEFAULT_CAPACITY)?,
            index_purge_interval: parse_env_u64(
                "INDEX_PURGE_INTERVAL",
                DEFAULT_PURGE_INTERVAL as u64,
            )? as i64,

            // Pagination
            default_page_size: parse_env_usize("DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rebuild_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REBUILD_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.feed_batches == 0 {
            return Err(ConfigError::InvalidValue {
                name: "FEED_BATCHES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.index_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "INDEX_CAPACITY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.index_purge_interval <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "INDEX_PURGE_INTERVAL".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.default_page_size == 0 || self.default_page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                name: "DEFAULT_PAGE_SIZE".to_string(),
                message: format!("must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }
        if self.post_table.is_empty() || self.post_table.contains(':') {
            return Err(ConfigError::InvalidValue {
                name: "POST_TABLE".to_string(),
                message: "must be non-empty and must not contain ':'".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
