//! Run-level result model.
//!
//! [`WorkflowResult::from_outputs`] is a pure function of the accumulated
//! stage outputs and two timestamps. It performs no I/O, so tests can build
//! results from fabricated stage lists directly.

use super::models::{
    CategoryPublishResult, CollectedArticle, ExtractedArticle, PublicationStatus,
    PublishedArticle, SummarizedArticle,
};
use crate::utils::{domain_of, round1};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const STAGE_COLLECTION: &str = "collection";
pub const STAGE_EXTRACTION: &str = "extraction";
pub const STAGE_SUMMARIZATION: &str = "summarization";
pub const STAGE_GROUPING: &str = "grouping";
pub const STAGE_EXPORT: &str = "export";
pub const STAGE_PUBLISHING: &str = "publishing";

/// One item's failure at a stage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub stage: String,
    pub url: String,
    pub error: String,
}

impl FailureRecord {
    pub fn new(stage: &str, url: &str, error: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            url: url.to_string(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub stage: String,
    pub elapsed_seconds: f64,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainExtractionRate {
    pub domain: String,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// Percent, one decimal.
    pub success_rate: f64,
}

/// Everything a run accumulates before the result is assembled.
#[derive(Debug, Clone, Default)]
pub struct StageOutputs {
    pub collected: Vec<CollectedArticle>,
    pub extracted: Vec<ExtractedArticle>,
    pub summarized: Vec<SummarizedArticle>,
    pub published: Vec<PublishedArticle>,
    pub category_results: Vec<CategoryPublishResult>,
    pub extraction_failures: Vec<FailureRecord>,
    pub summarization_failures: Vec<FailureRecord>,
    pub publication_failures: Vec<FailureRecord>,
    pub export_failures: Vec<FailureRecord>,
    pub stage_metrics: Vec<StageMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub total_collected: usize,
    pub total_extracted: usize,
    pub total_summarized: usize,
    pub total_published: usize,
    pub total_duplicates: usize,
    pub extraction_failures: Vec<FailureRecord>,
    pub summarization_failures: Vec<FailureRecord>,
    pub publication_failures: Vec<FailureRecord>,
    pub export_failures: Vec<FailureRecord>,
    pub published_articles: Vec<PublishedArticle>,
    pub category_results: Vec<CategoryPublishResult>,
    pub stage_metrics: Vec<StageMetrics>,
    pub domain_extraction_rates: Vec<DomainExtractionRate>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
}

impl WorkflowResult {
    pub fn from_outputs(
        outputs: StageOutputs,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let article_status_count = |status: PublicationStatus| {
            outputs
                .published
                .iter()
                .filter(|p| p.publication_status == status)
                .count()
        };
        let group_status_count = |status: PublicationStatus| -> usize {
            outputs
                .category_results
                .iter()
                .filter(|r| r.status == status)
                .map(|r| r.article_count)
                .sum()
        };

        let total_published = article_status_count(PublicationStatus::Success)
            + group_status_count(PublicationStatus::Success);
        let total_duplicates = article_status_count(PublicationStatus::Duplicate)
            + group_status_count(PublicationStatus::Duplicate);

        let domain_extraction_rates =
            domain_rates(&outputs.extracted, &outputs.extraction_failures);

        let elapsed_seconds = (finished_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Self {
            total_collected: outputs.collected.len(),
            total_extracted: outputs.extracted.len(),
            total_summarized: outputs.summarized.len(),
            total_published,
            total_duplicates,
            extraction_failures: outputs.extraction_failures,
            summarization_failures: outputs.summarization_failures,
            publication_failures: outputs.publication_failures,
            export_failures: outputs.export_failures,
            published_articles: outputs.published,
            category_results: outputs.category_results,
            stage_metrics: outputs.stage_metrics,
            domain_extraction_rates,
            started_at,
            finished_at,
            elapsed_seconds,
        }
    }

    pub fn total_failures(&self) -> usize {
        self.extraction_failures.len()
            + self.summarization_failures.len()
            + self.publication_failures.len()
            + self.export_failures.len()
    }
}

/// Per-domain extraction success over every extraction attempt, ordered by
/// attempt count (desc) then domain.
fn domain_rates(
    extracted: &[ExtractedArticle],
    failures: &[FailureRecord],
) -> Vec<DomainExtractionRate> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for article in extracted {
        counts.entry(domain_of(article.url())).or_default().0 += 1;
    }
    for failure in failures {
        counts.entry(domain_of(&failure.url)).or_default().1 += 1;
    }

    counts
        .into_iter()
        .map(|(domain, (success, failed))| {
            let total = success + failed;
            DomainExtractionRate {
                domain,
                total,
                success,
                failed,
                success_rate: round1(success as f64 / total as f64 * 100.0),
            }
        })
        .sorted_by(|a, b| b.total.cmp(&a.total).then_with(|| a.domain.cmp(&b.domain)))
        .collect()
}
