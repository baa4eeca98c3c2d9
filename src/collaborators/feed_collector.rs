//! Collector backed by the feed fetcher: every run fetches all enabled feeds
//! and hands on the items that were new in this fetch.

use crate::error::StageError;
use crate::feeds::{Feed, FeedFetcher, FeedItem, FeedSource};
use crate::pipeline::{CollectedArticle, Collector};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

pub struct FeedCollector<S> {
    fetcher: FeedFetcher<S>,
    category: Option<String>,
    max_concurrent: usize,
}

impl<S: FeedSource> FeedCollector<S> {
    pub fn new(fetcher: FeedFetcher<S>, max_concurrent: usize) -> Self {
        Self {
            fetcher,
            category: None,
            max_concurrent,
        }
    }

    /// Restrict collection to feeds of one category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

fn to_article(feed: &Feed, item: &FeedItem) -> CollectedArticle {
    let source = if feed.title.is_empty() {
        feed.id.clone()
    } else {
        feed.title.clone()
    };
    CollectedArticle {
        url: item.link.clone(),
        title: item.title.clone(),
        source,
        category: feed.category.clone(),
        published_at: item.published,
        feed_summary: item.summary.clone(),
        collected_at: item.fetched_at,
    }
}

#[async_trait]
impl<S: FeedSource> Collector for FeedCollector<S> {
    #[instrument(level = "info", skip_all, fields(category = ?self.category))]
    async fn collect(&self) -> Result<Vec<CollectedArticle>, StageError> {
        let results = self
            .fetcher
            .fetch_all(self.category.as_deref(), self.max_concurrent)
            .await;

        let feeds: HashMap<String, Feed> = self
            .fetcher
            .registry()
            .list()
            .await
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();

        let mut articles = Vec::new();
        for result in results.iter().filter(|r| r.success && r.new_items > 0) {
            let Some(feed) = feeds.get(&result.feed_id) else {
                continue;
            };
            // New items sit at the head of the merged store.
            let items = match self.fetcher.store().load(&feed.id).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(feed_id = %feed.id, error = %e, "Could not read stored items");
                    continue;
                }
            };
            for item in items.iter().take(result.new_items) {
                if item.link.is_empty() {
                    warn!(feed_id = %feed.id, item_id = %item.item_id, "Item has no link; skipping");
                    continue;
                }
                articles.push(to_article(feed, item));
            }
        }

        info!(
            feeds = results.len(),
            failed_feeds = results.iter().filter(|r| !r.success).count(),
            articles = articles.len(),
            "Collected new feed items"
        );
        Ok(articles)
    }
}
