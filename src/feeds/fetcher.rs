//! Concurrent feed fetching with per-feed failure isolation.
//!
//! [`FeedFetcher::fetch_feed`] turns every fetch, parse or store failure into
//! a failed [`FetchResult`]; only an unknown feed id is returned as an error.
//! [`FeedFetcher::fetch_all`] fans out over the selected feeds with a bounded
//! number of in-flight fetches and reassembles results in feed order.

use super::parser::parse_feed;
use super::store::{FeedRegistry, ItemStore, diff_items};
use super::{Feed, FeedStatus, FetchResult};
use crate::error::FeedError;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Upper bound on concurrent feed fetches regardless of what callers ask for.
pub const MAX_CONCURRENT_CAP: usize = 10;

/// Something that can return the raw bytes behind a feed URL.
pub trait FeedSource: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FeedError>> + Send;
}

/// [`FeedSource`] over plain HTTP. Non-2xx responses are fetch errors.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Fetch {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl FeedSource for HttpFeedSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let fetch_err = |message: String| FeedError::Fetch {
            url: url.to_string(),
            message,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        debug!(bytes = bytes.len(), "Fetched feed body");
        Ok(bytes.to_vec())
    }
}

/// Fetches feeds, diffs them against the item store and records status.
pub struct FeedFetcher<S> {
    source: S,
    registry: Arc<FeedRegistry>,
    store: ItemStore,
}

impl<S: FeedSource> FeedFetcher<S> {
    pub fn new(source: S, registry: Arc<FeedRegistry>, store: ItemStore) -> Self {
        Self {
            source,
            registry,
            store,
        }
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    /// Fetch one feed, merge its new items into the store and record the
    /// attempt.
    ///
    /// # Errors
    ///
    /// Only [`FeedError::NotFound`] when `feed_id` is not registered. Every
    /// other failure is reported as `FetchResult { success: false, .. }` and
    /// leaves the stored items untouched.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_feed(&self, feed_id: &str) -> Result<FetchResult, FeedError> {
        let feed = self
            .registry
            .get(feed_id)
            .await
            .ok_or_else(|| FeedError::NotFound {
                feed_id: feed_id.to_string(),
            })?;

        let t0 = Instant::now();
        let attempted_at = Utc::now();
        let (status, result) = match self.fetch_and_merge(&feed, attempted_at).await {
            Ok((items_count, new_items)) => {
                info!(
                    feed_id,
                    items_count,
                    new_items,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Fetched feed"
                );
                (
                    FeedStatus::Success,
                    FetchResult::succeeded(feed_id, items_count, new_items),
                )
            }
            Err(e) => {
                warn!(
                    feed_id,
                    url = %feed.url,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    error = %e,
                    "Feed fetch failed"
                );
                (FeedStatus::Failure, FetchResult::failed(feed_id, &e))
            }
        };

        if let Err(e) = self
            .registry
            .record_attempt(feed_id, status, attempted_at)
            .await
        {
            warn!(feed_id, error = %e, "Failed to record fetch status");
        }
        Ok(result)
    }

    async fn fetch_and_merge(
        &self,
        feed: &Feed,
        fetched_at: DateTime<Utc>,
    ) -> Result<(usize, usize), FeedError> {
        let bytes = self.source.fetch(&feed.url).await?;
        let items = parse_feed(&bytes, fetched_at)?;
        let items_count = items.len();

        let stored = self.store.load(&feed.id).await?;
        let (new_items, merged) = diff_items(&stored, items);
        if !new_items.is_empty() {
            self.store.save(&feed.id, &merged).await?;
        }
        Ok((items_count, new_items.len()))
    }

    /// Fetch every enabled feed (optionally one category) with at most
    /// `min(max_concurrent, 10)` fetches in flight.
    ///
    /// Always returns one result per selected feed, in registry order.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_all(&self, category: Option<&str>, max_concurrent: usize) -> Vec<FetchResult> {
        let feeds = self.registry.select(category).await;
        let limit = max_concurrent.clamp(1, MAX_CONCURRENT_CAP);
        info!(feeds = feeds.len(), limit, "Fetching feeds");

        let mut results: Vec<(usize, FetchResult)> = stream::iter(feeds.into_iter().enumerate())
            .map(|(idx, feed)| async move {
                let result = match self.fetch_feed(&feed.id).await {
                    Ok(result) => result,
                    Err(e) => FetchResult::failed(&feed.id, e),
                };
                (idx, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);

        let results: Vec<FetchResult> = results.into_iter().map(|(_, r)| r).collect();
        let failed = results.iter().filter(|r| !r.success).count();
        let new_items: usize = results.iter().map(|r| r.new_items).sum();
        info!(
            total = results.len(),
            failed,
            new_items,
            "Completed feed fetch"
        );
        results
    }
}
