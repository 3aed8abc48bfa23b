//! Forum feed aggregator library.
//!
//! Samples posts from many forums into weighted, shuffled feed snapshots,
//! rebuilds them in the background, and serves them through cursor
//! pagination that stays consistent across rebuilds.

pub mod config;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod posts;
pub mod schema;
pub mod service;
pub mod store;
pub mod submission;
pub mod web;
