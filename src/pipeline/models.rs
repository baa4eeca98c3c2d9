//! Stage artifacts passed between pipeline stages.
//!
//! Each artifact owns a copy of its predecessor, so a stage's output never
//! aliases its input and nothing is mutated after creation:
//!
//! ```text
//! CollectedArticle ─▶ ExtractedArticle ─▶ SummarizedArticle ─▶ PublishedArticle
//!                                                 │
//!                                                 └─▶ CategoryGroup ─▶ CategoryPublishResult
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An article discovered by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedArticle {
    pub url: String,
    pub title: String,
    /// Feed (or other source) the article came from.
    pub source: String,
    pub category: String,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub feed_summary: String,
    pub collected_at: DateTime<Utc>,
}

impl CollectedArticle {
    /// Publication date, or collection date when the source gave none.
    pub fn date(&self) -> NaiveDate {
        self.published_at.unwrap_or(self.collected_at).date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedArticle {
    pub article: CollectedArticle,
    pub body_text: String,
    pub extraction_status: ExtractionStatus,
    pub error_message: Option<String>,
}

impl ExtractedArticle {
    pub fn success(article: CollectedArticle, body_text: String) -> Self {
        Self {
            article,
            body_text,
            extraction_status: ExtractionStatus::Success,
            error_message: None,
        }
    }

    pub fn failed(article: CollectedArticle, error: impl Into<String>) -> Self {
        Self {
            article,
            body_text: String::new(),
            extraction_status: ExtractionStatus::Failed,
            error_message: Some(error.into()),
        }
    }

    pub fn url(&self) -> &str {
        &self.article.url
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummarizationStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizedArticle {
    pub extracted: ExtractedArticle,
    pub summary: String,
    pub summarization_status: SummarizationStatus,
    pub error_message: Option<String>,
}

impl SummarizedArticle {
    pub fn success(extracted: ExtractedArticle, summary: String) -> Self {
        Self {
            extracted,
            summary,
            summarization_status: SummarizationStatus::Success,
            error_message: None,
        }
    }

    pub fn failed(extracted: ExtractedArticle, error: impl Into<String>) -> Self {
        Self {
            extracted,
            summary: String::new(),
            summarization_status: SummarizationStatus::Failed,
            error_message: Some(error.into()),
        }
    }

    pub fn url(&self) -> &str {
        self.extracted.url()
    }

    pub fn article(&self) -> &CollectedArticle {
        &self.extracted.article
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationStatus {
    Success,
    Skipped,
    Failed,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedArticle {
    pub summarized: SummarizedArticle,
    pub issue_number: Option<u64>,
    pub issue_url: Option<String>,
    pub publication_status: PublicationStatus,
    pub error_message: Option<String>,
}

impl PublishedArticle {
    pub fn new(summarized: SummarizedArticle, status: PublicationStatus) -> Self {
        Self {
            summarized,
            issue_number: None,
            issue_url: None,
            publication_status: status,
            error_message: None,
        }
    }

    pub fn created(summarized: SummarizedArticle, issue_number: u64, issue_url: String) -> Self {
        Self {
            issue_number: Some(issue_number),
            issue_url: Some(issue_url),
            ..Self::new(summarized, PublicationStatus::Success)
        }
    }

    pub fn failed(summarized: SummarizedArticle, error: impl Into<String>) -> Self {
        Self {
            error_message: Some(error.into()),
            ..Self::new(summarized, PublicationStatus::Failed)
        }
    }

    pub fn url(&self) -> &str {
        self.summarized.url()
    }
}

/// Summarized articles sharing a category and date, published as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub category: String,
    pub category_label: String,
    pub date: NaiveDate,
    pub title: String,
    pub articles: Vec<SummarizedArticle>,
}

impl CategoryGroup {
    pub fn matches(&self, category: &str, date: NaiveDate) -> bool {
        self.category == category && self.date == date
    }
}

/// Publication outcome of one [`CategoryGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPublishResult {
    pub category: String,
    pub category_label: String,
    pub date: NaiveDate,
    pub title: String,
    pub article_count: usize,
    pub status: PublicationStatus,
    pub issue_number: Option<u64>,
    pub issue_url: Option<String>,
    pub error_message: Option<String>,
    /// Where the group was rendered by the exporter, if it was.
    #[serde(default)]
    pub export_path: Option<String>,
}

impl CategoryPublishResult {
    pub fn for_group(group: &CategoryGroup, status: PublicationStatus) -> Self {
        Self {
            category: group.category.clone(),
            category_label: group.category_label.clone(),
            date: group.date,
            title: group.title.clone(),
            article_count: group.articles.len(),
            status,
            issue_number: None,
            issue_url: None,
            error_message: None,
            export_path: None,
        }
    }
}
