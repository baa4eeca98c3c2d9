//! Persisted feed state: the feed registry and the per-feed item store.
//!
//! Both are plain JSON files. Writes go to a temporary sibling first and are
//! renamed into place, so a failed write leaves the previous file intact.

use super::{Feed, FeedItem, FeedStatus};
use crate::error::FeedError;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Compute the items not previously seen and the merged item list.
///
/// `fetched` is deduplicated by `item_id` (first occurrence wins). New items
/// keep their fetched order and are placed ahead of the stored items, which
/// keep their prior order.
///
/// Returns `(new_items, merged)`.
pub fn diff_items(stored: &[FeedItem], fetched: Vec<FeedItem>) -> (Vec<FeedItem>, Vec<FeedItem>) {
    let seen: HashSet<&str> = stored.iter().map(|i| i.item_id.as_str()).collect();
    let new_items: Vec<FeedItem> = fetched
        .into_iter()
        .unique_by(|i| i.item_id.clone())
        .filter(|i| !seen.contains(i.item_id.as_str()))
        .collect();

    let mut merged = Vec::with_capacity(new_items.len() + stored.len());
    merged.extend(new_items.iter().cloned());
    merged.extend(stored.iter().cloned());
    (new_items, merged)
}

async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), FeedError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// The list of subscribed feeds.
///
/// Feeds are only ever added or updated; nothing here deletes a feed.
#[derive(Debug)]
pub struct FeedRegistry {
    path: Option<PathBuf>,
    feeds: Mutex<Vec<Feed>>,
}

impl FeedRegistry {
    /// Load the registry from a JSON file. A missing file is an empty registry.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref().to_path_buf();
        let feeds = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<Feed>>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No registry file yet; starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        info!(count = feeds.len(), "Loaded feed registry");
        Ok(Self {
            path: Some(path),
            feeds: Mutex::new(feeds),
        })
    }

    /// A registry that is never written to disk.
    pub fn in_memory(feeds: Vec<Feed>) -> Self {
        Self {
            path: None,
            feeds: Mutex::new(feeds),
        }
    }

    pub async fn get(&self, feed_id: &str) -> Option<Feed> {
        self.feeds
            .lock()
            .await
            .iter()
            .find(|f| f.id == feed_id)
            .cloned()
    }

    pub async fn list(&self) -> Vec<Feed> {
        self.feeds.lock().await.clone()
    }

    /// Enabled feeds, optionally restricted to one category, in registry order.
    pub async fn select(&self, category: Option<&str>) -> Vec<Feed> {
        self.feeds
            .lock()
            .await
            .iter()
            .filter(|f| f.enabled)
            .filter(|f| category.is_none_or(|c| f.category == c))
            .cloned()
            .collect()
    }

    /// Record the outcome of a fetch attempt and persist the registry.
    pub async fn record_attempt(
        &self,
        feed_id: &str,
        status: FeedStatus,
        at: DateTime<Utc>,
    ) -> Result<(), FeedError> {
        let mut feeds = self.feeds.lock().await;
        let feed = feeds
            .iter_mut()
            .find(|f| f.id == feed_id)
            .ok_or_else(|| FeedError::NotFound {
                feed_id: feed_id.to_string(),
            })?;
        feed.last_fetched = Some(at);
        feed.last_status = status;
        self.persist(&feeds).await
    }

    /// Merge feed definitions from configuration into the registry.
    ///
    /// Unknown ids are added as PENDING. Known ids get their url, title,
    /// category, interval and enabled flag refreshed while fetch history is
    /// kept. Feeds missing from `defs` are left alone.
    pub async fn sync_from_config(&self, defs: &[Feed]) -> Result<(), FeedError> {
        let mut feeds = self.feeds.lock().await;
        let mut added = 0usize;
        for def in defs {
            match feeds.iter_mut().find(|f| f.id == def.id) {
                Some(existing) => {
                    existing.url = def.url.clone();
                    existing.title = def.title.clone();
                    existing.category = def.category.clone();
                    existing.fetch_interval = def.fetch_interval;
                    existing.enabled = def.enabled;
                }
                None => {
                    let mut feed = def.clone();
                    feed.last_fetched = None;
                    feed.last_status = FeedStatus::Pending;
                    feeds.push(feed);
                    added += 1;
                }
            }
        }
        info!(added, total = feeds.len(), "Synced feed registry from configuration");
        self.persist(&feeds).await
    }

    async fn persist(&self, feeds: &[Feed]) -> Result<(), FeedError> {
        match &self.path {
            Some(path) => write_atomic(path, serde_json::to_vec_pretty(feeds)?).await,
            None => Ok(()),
        }
    }
}

/// Per-feed item sets stored as `{dir}/{feed_id}.json`.
#[derive(Debug, Clone)]
pub struct ItemStore {
    dir: PathBuf,
}

impl ItemStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Safe ids map to `{id}.json`. Any other id is sanitized and tagged
    /// with a hash of the raw id after a `~`, which no safe id contains, so
    /// distinct ids never share a file.
    fn path_for(&self, feed_id: &str) -> PathBuf {
        let is_safe = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        if !feed_id.is_empty() && feed_id.chars().all(is_safe) {
            return self.dir.join(format!("{feed_id}.json"));
        }
        let name: String = feed_id
            .chars()
            .map(|c| if is_safe(c) { c } else { '_' })
            .collect();
        let digest = format!("{:x}", Sha256::digest(feed_id.as_bytes()));
        self.dir.join(format!("{name}~{}.json", &digest[..16]))
    }

    /// Stored items for a feed, newest first. A feed never fetched has none.
    pub async fn load(&self, feed_id: &str) -> Result<Vec<FeedItem>, FeedError> {
        let path = self.path_for(feed_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                warn!(feed_id, path = %path.display(), error = %e, "Failed reading item store");
                Err(e.into())
            }
        }
    }

    pub async fn save(&self, feed_id: &str, items: &[FeedItem]) -> Result<(), FeedError> {
        let path = self.path_for(feed_id);
        write_atomic(&path, serde_json::to_vec_pretty(items)?).await?;
        debug!(feed_id, count = items.len(), path = %path.display(), "Saved item store");
        Ok(())
    }
}
