//! Feed registry, per-feed item store, RSS/Atom parsing and the concurrent
//! feed fetcher.
//!
//! # Data flow
//!
//! ```text
//! FeedRegistry ──select──▶ FeedFetcher::fetch_all ──▶ FeedSource (HTTP)
//!                                │                       │ bytes
//!                                │                  parser::parse_feed
//!                                ▼                       │ Vec<FeedItem>
//!                         ItemStore ◀──diff_items/merge──┘
//! ```
//!
//! The item store is partitioned per feed id, so concurrent fetches never
//! write the same file.

pub mod fetcher;
pub mod parser;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use fetcher::{FeedFetcher, FeedSource, HttpFeedSource, MAX_CONCURRENT_CAP};
pub use store::{FeedRegistry, ItemStore, diff_items};

/// Outcome of the most recent fetch attempt for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedStatus {
    #[default]
    Pending,
    Success,
    Failure,
}

/// A subscribed RSS/Atom source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    /// Minutes between fetches.
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub last_fetched: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: FeedStatus,
}

fn default_fetch_interval() -> u32 {
    60
}

fn default_enabled() -> bool {
    true
}

impl Feed {
    pub fn new(id: &str, url: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            title: String::new(),
            category: category.to_string(),
            fetch_interval: default_fetch_interval(),
            enabled: true,
            last_fetched: None,
            last_status: FeedStatus::Pending,
        }
    }
}

/// One entry of a feed. Identity is `item_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub item_id: String,
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Result of one `fetch_feed` call. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub feed_id: String,
    pub success: bool,
    pub items_count: usize,
    pub new_items: usize,
    pub error_message: Option<String>,
}

impl FetchResult {
    pub fn succeeded(feed_id: &str, items_count: usize, new_items: usize) -> Self {
        Self {
            feed_id: feed_id.to_string(),
            success: true,
            items_count,
            new_items,
            error_message: None,
        }
    }

    pub fn failed(feed_id: &str, error: impl ToString) -> Self {
        Self {
            feed_id: feed_id.to_string(),
            success: false,
            items_count: 0,
            new_items: 0,
            error_message: Some(error.to_string()),
        }
    }
}
