//! Collaborator seams consumed by the orchestrator.
//!
//! Each stage of a run talks to exactly one of these traits. Concrete
//! implementations live in `crate::collaborators`; tests swap in fakes.

use super::models::{
    CategoryGroup, CategoryPublishResult, CollectedArticle, ExtractedArticle, PublishedArticle,
    SummarizedArticle,
};
use crate::error::StageError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Produces the articles a run starts from.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self) -> Result<Vec<CollectedArticle>, StageError>;
}

/// Fetches the body of one article.
///
/// May report failure either as `Ok` with [`super::ExtractionStatus::Failed`]
/// or as `Err`; the orchestrator records both the same way.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, article: &CollectedArticle) -> Result<ExtractedArticle, StageError>;
}

/// Summarizes a batch of extracted articles, one output per input, in order.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize_batch(
        &self,
        articles: &[ExtractedArticle],
    ) -> Result<Vec<SummarizedArticle>, StageError>;
}

/// Publishing target (issue tracker, CMS, ...).
#[async_trait]
pub trait Publisher: Send + Sync {
    /// URLs already published within the last `days` days.
    async fn get_existing_urls(&self, days: u32) -> Result<HashSet<String>, StageError>;

    fn is_duplicate_url(&self, url: &str, existing: &HashSet<String>) -> bool {
        if existing.contains(url) {
            return true;
        }
        let wanted = normalize_url(url);
        existing.iter().any(|e| normalize_url(e) == wanted)
    }

    async fn publish_batch(
        &self,
        articles: &[SummarizedArticle],
        dry_run: bool,
    ) -> Result<Vec<PublishedArticle>, StageError>;

    async fn publish_category_batch(
        &self,
        groups: &[CategoryGroup],
        dry_run: bool,
    ) -> Result<Vec<CategoryPublishResult>, StageError>;
}

/// Batches summarized articles by (category, date).
pub trait Grouper: Send + Sync {
    fn group(&self, articles: &[SummarizedArticle]) -> Vec<CategoryGroup>;
}

/// Renders one group to a file under `export_dir`, returning its path.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, group: &CategoryGroup, export_dir: &Path) -> Result<PathBuf, StageError>;
}

/// Canonical form used for duplicate URL comparison: no fragment, no
/// trailing slash.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_fragment = match url::Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => trimmed.split('#').next().unwrap_or(trimmed).to_string(),
    };
    without_fragment.trim_end_matches('/').to_string()
}
