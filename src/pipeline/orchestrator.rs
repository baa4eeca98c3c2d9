//! One end-to-end ingestion run.
//!
//! Stages run strictly in sequence:
//!
//! 1. **Collection**: the only stage whose error aborts the run.
//! 2. **Extraction**: one call per candidate; failures become records.
//! 3. **Summarization**: one batched call over the extracted set.
//! 4. **Publishing**: per article (with duplicate-window suppression) or
//!    per (category, date) group, optionally exported first.
//!
//! Stage inputs are never mutated. Survivors are tracked as index lists into
//! the previous stage's output and copied once when handed to a
//! collaborator.

use super::models::{
    CategoryGroup, CategoryPublishResult, CollectedArticle, ExtractionStatus, PublicationStatus,
    PublishedArticle, SummarizationStatus, SummarizedArticle,
};
use super::result::{
    FailureRecord, STAGE_COLLECTION, STAGE_EXPORT, STAGE_EXTRACTION, STAGE_GROUPING,
    STAGE_PUBLISHING, STAGE_SUMMARIZATION, StageMetrics, StageOutputs, WorkflowResult,
};
use super::traits::{Collector, Exporter, Extractor, Grouper, Publisher, Summarizer};
use crate::error::PipelineError;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Default rolling window for per-article duplicate suppression.
pub const DEFAULT_DEDUP_DAYS: u32 = 7;

/// Per-invocation parameters.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Keep only articles whose category maps to one of these statuses.
    pub statuses: Option<Vec<String>>,
    pub max_articles: Option<usize>,
    /// Forwarded to the publisher; earlier stages always run.
    pub dry_run: bool,
    /// Export groups but do not publish.
    pub export_only: bool,
}

/// How summarized articles reach the publisher.
#[derive(Clone)]
pub enum PublishMode {
    PerArticle {
        dedup_days: u32,
    },
    PerCategory {
        grouper: Arc<dyn Grouper>,
        exporter: Option<(Arc<dyn Exporter>, PathBuf)>,
    },
}

impl Default for PublishMode {
    fn default() -> Self {
        PublishMode::PerArticle {
            dedup_days: DEFAULT_DEDUP_DAYS,
        }
    }
}

impl std::fmt::Debug for PublishMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishMode::PerArticle { dedup_days } => f
                .debug_struct("PerArticle")
                .field("dedup_days", dedup_days)
                .finish(),
            PublishMode::PerCategory { exporter, .. } => f
                .debug_struct("PerCategory")
                .field("export_dir", &exporter.as_ref().map(|(_, dir)| dir))
                .finish(),
        }
    }
}

fn metric(stage: &str, t0: Instant, item_count: usize) -> StageMetrics {
    StageMetrics {
        stage: stage.to_string(),
        elapsed_seconds: t0.elapsed().as_secs_f64(),
        item_count,
    }
}

pub struct Orchestrator {
    collector: Arc<dyn Collector>,
    extractor: Arc<dyn Extractor>,
    summarizer: Arc<dyn Summarizer>,
    publisher: Arc<dyn Publisher>,
    mode: PublishMode,
    category_status: HashMap<String, String>,
}

impl Orchestrator {
    pub fn new(
        collector: Arc<dyn Collector>,
        extractor: Arc<dyn Extractor>,
        summarizer: Arc<dyn Summarizer>,
        publisher: Arc<dyn Publisher>,
        mode: PublishMode,
    ) -> Self {
        Self {
            collector,
            extractor,
            summarizer,
            publisher,
            mode,
            category_status: HashMap::new(),
        }
    }

    /// Category → status mapping consulted by [`RunOptions::statuses`].
    pub fn with_category_status(mut self, category_status: HashMap<String, String>) -> Self {
        self.category_status = category_status;
        self
    }

    /// Run every stage once and assemble the [`WorkflowResult`].
    ///
    /// # Errors
    ///
    /// [`PipelineError::Collection`] when the collector fails and
    /// [`PipelineError::InvalidConfig`] for an unusable status filter.
    /// Per-article failures in later stages never produce an error.
    #[instrument(level = "info", skip_all, fields(dry_run = opts.dry_run, export_only = opts.export_only))]
    pub async fn run(&self, opts: &RunOptions) -> Result<WorkflowResult, PipelineError> {
        if opts.statuses.is_some() && self.category_status.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "status filter requested but no category_status mapping is configured".to_string(),
            ));
        }

        let started_at = Utc::now();
        let mut out = StageOutputs::default();

        // ---- Collection ----
        let t0 = Instant::now();
        let collected = self.collector.collect().await.map_err(|e| {
            error!(error = %e, "Collection failed");
            PipelineError::Collection(e)
        })?;
        let candidates = self.select_candidates(&collected, opts);
        out.stage_metrics
            .push(metric(STAGE_COLLECTION, t0, collected.len()));
        info!(
            collected = collected.len(),
            candidates = candidates.len(),
            "Collection complete"
        );
        out.collected = collected;

        // ---- Extraction ----
        if !candidates.is_empty() {
            let t0 = Instant::now();
            for &i in &candidates {
                let article = &out.collected[i];
                match self.extractor.extract(article).await {
                    Ok(extracted) if extracted.extraction_status == ExtractionStatus::Success => {
                        debug!(url = %article.url, chars = extracted.body_text.len(), "Extracted");
                        out.extracted.push(extracted);
                    }
                    Ok(extracted) => {
                        let reason = extracted
                            .error_message
                            .unwrap_or_else(|| "extraction failed".to_string());
                        warn!(url = %article.url, %reason, "Extraction failed");
                        out.extraction_failures
                            .push(FailureRecord::new(STAGE_EXTRACTION, &article.url, reason));
                    }
                    Err(e) => {
                        warn!(url = %article.url, error = %e, "Extractor error");
                        out.extraction_failures.push(FailureRecord::new(
                            STAGE_EXTRACTION,
                            &article.url,
                            e.to_string(),
                        ));
                    }
                }
            }
            out.stage_metrics
                .push(metric(STAGE_EXTRACTION, t0, candidates.len()));
            info!(
                extracted = out.extracted.len(),
                failed = out.extraction_failures.len(),
                "Extraction complete"
            );
        }

        // ---- Summarization ----
        if !out.extracted.is_empty() {
            let t0 = Instant::now();
            match self.summarizer.summarize_batch(&out.extracted).await {
                Ok(results) => {
                    let mut results = results.into_iter();
                    for extracted in &out.extracted {
                        match results.next() {
                            Some(s) if s.summarization_status == SummarizationStatus::Success => {
                                out.summarized.push(s);
                            }
                            Some(s) => {
                                let reason = s
                                    .error_message
                                    .unwrap_or_else(|| "summarization failed".to_string());
                                out.summarization_failures.push(FailureRecord::new(
                                    STAGE_SUMMARIZATION,
                                    extracted.url(),
                                    reason,
                                ));
                            }
                            None => out.summarization_failures.push(FailureRecord::new(
                                STAGE_SUMMARIZATION,
                                extracted.url(),
                                "summarizer returned no result",
                            )),
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Summarizer batch failed");
                    out.summarization_failures
                        .extend(out.extracted.iter().map(|a| {
                            FailureRecord::new(STAGE_SUMMARIZATION, a.url(), e.to_string())
                        }));
                }
            }
            out.stage_metrics
                .push(metric(STAGE_SUMMARIZATION, t0, out.extracted.len()));
            info!(
                summarized = out.summarized.len(),
                failed = out.summarization_failures.len(),
                "Summarization complete"
            );
        }

        // ---- Publishing ----
        if !out.summarized.is_empty() {
            match &self.mode {
                PublishMode::PerArticle { dedup_days } => {
                    self.publish_per_article(&mut out, *dedup_days, opts).await;
                }
                PublishMode::PerCategory { grouper, exporter } => {
                    self.publish_per_category(&mut out, grouper.as_ref(), exporter.as_ref(), opts)
                        .await;
                }
            }
        }

        let result = WorkflowResult::from_outputs(out, started_at, Utc::now());
        info!(
            collected = result.total_collected,
            extracted = result.total_extracted,
            summarized = result.total_summarized,
            published = result.total_published,
            duplicates = result.total_duplicates,
            failures = result.total_failures(),
            elapsed_secs = result.elapsed_seconds,
            "Run complete"
        );
        Ok(result)
    }

    /// Indices of collected articles that pass the status filter, capped at
    /// `max_articles`, in collection order.
    fn select_candidates(&self, collected: &[CollectedArticle], opts: &RunOptions) -> Vec<usize> {
        let mut selected: Vec<usize> = collected
            .iter()
            .enumerate()
            .filter(|(_, article)| match &opts.statuses {
                None => true,
                Some(allowed) => self
                    .category_status
                    .get(&article.category)
                    .is_some_and(|status| allowed.iter().any(|a| a.eq_ignore_ascii_case(status))),
            })
            .map(|(i, _)| i)
            .collect();
        if let Some(max) = opts.max_articles {
            selected.truncate(max);
        }
        selected
    }

    async fn publish_per_article(&self, out: &mut StageOutputs, dedup_days: u32, opts: &RunOptions) {
        let t0 = Instant::now();
        let existing = match self.publisher.get_existing_urls(dedup_days).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(error = %e, "Could not read recent publications; skipping duplicate check");
                HashSet::new()
            }
        };

        let total = out.summarized.len();
        let mut slots: Vec<Option<PublishedArticle>> = vec![None; total];
        let mut fresh: Vec<usize> = Vec::new();
        for (i, article) in out.summarized.iter().enumerate() {
            if self.publisher.is_duplicate_url(article.url(), &existing) {
                info!(url = %article.url(), "Skipping duplicate");
                slots[i] = Some(PublishedArticle::new(
                    article.clone(),
                    PublicationStatus::Duplicate,
                ));
            } else {
                fresh.push(i);
            }
        }

        let batch: Vec<SummarizedArticle> = fresh.iter().map(|&i| out.summarized[i].clone()).collect();
        if opts.export_only {
            for (&i, article) in fresh.iter().zip(batch) {
                slots[i] = Some(PublishedArticle::new(article, PublicationStatus::Skipped));
            }
        } else if !batch.is_empty() {
            let outcome = self.publisher.publish_batch(&batch, opts.dry_run).await;
            match outcome {
                Ok(results) => {
                    let mut results = results.into_iter();
                    for (&i, article) in fresh.iter().zip(batch) {
                        slots[i] = Some(results.next().unwrap_or_else(|| {
                            PublishedArticle::failed(article, "publisher returned no result")
                        }));
                    }
                }
                Err(e) => {
                    error!(error = %e, "Publish batch failed");
                    for (&i, article) in fresh.iter().zip(batch) {
                        slots[i] = Some(PublishedArticle::failed(article, e.to_string()));
                    }
                }
            }
        }

        out.published = slots.into_iter().flatten().collect();
        out.publication_failures.extend(
            out.published
                .iter()
                .filter(|p| p.publication_status == PublicationStatus::Failed)
                .map(|p| {
                    FailureRecord::new(
                        STAGE_PUBLISHING,
                        p.url(),
                        p.error_message.clone().unwrap_or_else(|| "publish failed".to_string()),
                    )
                }),
        );
        out.stage_metrics.push(metric(STAGE_PUBLISHING, t0, total));
        info!(
            published = out
                .published
                .iter()
                .filter(|p| p.publication_status == PublicationStatus::Success)
                .count(),
            duplicates = total - fresh.len(),
            failed = out.publication_failures.len(),
            "Publishing complete"
        );
    }

    async fn publish_per_category(
        &self,
        out: &mut StageOutputs,
        grouper: &dyn Grouper,
        exporter: Option<&(Arc<dyn Exporter>, PathBuf)>,
        opts: &RunOptions,
    ) {
        let t0 = Instant::now();
        let groups = grouper.group(&out.summarized);
        out.stage_metrics.push(metric(STAGE_GROUPING, t0, groups.len()));
        info!(groups = groups.len(), "Grouped articles by category and date");

        let mut export_paths: Vec<Option<String>> = vec![None; groups.len()];
        if let Some((exporter, export_dir)) = exporter {
            let t0 = Instant::now();
            for (i, group) in groups.iter().enumerate() {
                match exporter.export(group, export_dir).await {
                    Ok(path) => {
                        debug!(title = %group.title, path = %path.display(), "Exported group");
                        export_paths[i] = Some(path.display().to_string());
                    }
                    Err(e) => {
                        warn!(title = %group.title, error = %e, "Export failed");
                        out.export_failures.extend(group.articles.iter().map(|a| {
                            FailureRecord::new(STAGE_EXPORT, a.url(), e.to_string())
                        }));
                    }
                }
            }
            out.stage_metrics.push(metric(STAGE_EXPORT, t0, groups.len()));
        }

        let mut results: Vec<CategoryPublishResult> = if opts.export_only {
            groups
                .iter()
                .map(|g| CategoryPublishResult::for_group(g, PublicationStatus::Skipped))
                .collect()
        } else {
            let t0 = Instant::now();
            let results = match self.publisher.publish_category_batch(&groups, opts.dry_run).await {
                Ok(returned) => groups
                    .iter()
                    .map(|g| match_group_result(g, &returned))
                    .collect(),
                Err(e) => {
                    error!(error = %e, "Category publish batch failed");
                    groups
                        .iter()
                        .map(|g| failed_group(g, e.to_string()))
                        .collect()
                }
            };
            out.stage_metrics.push(metric(STAGE_PUBLISHING, t0, groups.len()));
            results
        };

        for ((result, group), path) in results.iter_mut().zip(&groups).zip(export_paths) {
            result.export_path = path;
            if result.status == PublicationStatus::Failed {
                let reason = result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "publish failed".to_string());
                out.publication_failures.extend(
                    group
                        .articles
                        .iter()
                        .map(|a| FailureRecord::new(STAGE_PUBLISHING, a.url(), reason.clone())),
                );
            }
        }
        out.category_results = results;
    }
}

fn failed_group(group: &CategoryGroup, error: String) -> CategoryPublishResult {
    CategoryPublishResult {
        error_message: Some(error),
        ..CategoryPublishResult::for_group(group, PublicationStatus::Failed)
    }
}

/// Find the publisher's result for `group` by category and date, falling
/// back to an exact title match.
fn match_group_result(
    group: &CategoryGroup,
    returned: &[CategoryPublishResult],
) -> CategoryPublishResult {
    returned
        .iter()
        .find(|r| group.matches(&r.category, r.date))
        .or_else(|| returned.iter().find(|r| r.title == group.title))
        .cloned()
        .unwrap_or_else(|| failed_group(group, "publisher returned no result".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CategoryGrouper;
    use crate::error::StageError;
    use crate::pipeline::models::ExtractedArticle;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, d, 9, 0, 0).unwrap()
    }

    fn article(url: &str, category: &str) -> CollectedArticle {
        CollectedArticle {
            url: url.to_string(),
            title: format!("Title for {url}"),
            source: "test-feed".to_string(),
            category: category.to_string(),
            published_at: Some(day(6)),
            feed_summary: String::new(),
            collected_at: day(6),
        }
    }

    struct FakeCollector(Result<Vec<CollectedArticle>, String>);

    #[async_trait]
    impl Collector for FakeCollector {
        async fn collect(&self) -> Result<Vec<CollectedArticle>, StageError> {
            self.0.clone().map_err(StageError::msg)
        }
    }

    #[derive(Default)]
    struct FakeExtractor {
        failing: HashSet<String>,
        erroring: HashSet<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(&self, article: &CollectedArticle) -> Result<ExtractedArticle, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.erroring.contains(&article.url) {
                return Err(StageError::msg("connection reset"));
            }
            if self.failing.contains(&article.url) {
                return Ok(ExtractedArticle::failed(article.clone(), "Tier 3: paywall detected"));
            }
            Ok(ExtractedArticle::success(article.clone(), "Body text".to_string()))
        }
    }

    #[derive(Default)]
    struct FakeSummarizer {
        failing: HashSet<String>,
        batch_error: bool,
    }

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize_batch(
            &self,
            articles: &[ExtractedArticle],
        ) -> Result<Vec<SummarizedArticle>, StageError> {
            if self.batch_error {
                return Err(StageError::msg("LLM endpoint unavailable"));
            }
            Ok(articles
                .iter()
                .map(|a| {
                    if self.failing.contains(a.url()) {
                        SummarizedArticle::failed(a.clone(), "empty completion")
                    } else {
                        SummarizedArticle::success(a.clone(), format!("Summary of {}", a.url()))
                    }
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        existing: HashSet<String>,
        fail_batch: bool,
        fail_category_batch: bool,
        failing_categories: HashSet<String>,
        /// Return at most this many results per call.
        result_limit: Option<usize>,
        batches: Mutex<Vec<(Vec<String>, bool)>>,
        category_batches: Mutex<Vec<Vec<CategoryGroup>>>,
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn get_existing_urls(&self, days: u32) -> Result<HashSet<String>, StageError> {
            assert_eq!(days, DEFAULT_DEDUP_DAYS);
            Ok(self.existing.clone())
        }

        async fn publish_batch(
            &self,
            articles: &[SummarizedArticle],
            dry_run: bool,
        ) -> Result<Vec<PublishedArticle>, StageError> {
            self.batches
                .lock()
                .unwrap()
                .push((articles.iter().map(|a| a.url().to_string()).collect(), dry_run));
            if self.fail_batch {
                return Err(StageError::msg("API rate limit exceeded"));
            }
            Ok(articles
                .iter()
                .enumerate()
                .map(|(n, a)| {
                    if dry_run {
                        PublishedArticle::new(a.clone(), PublicationStatus::Skipped)
                    } else {
                        let number = 100 + n as u64;
                        PublishedArticle::created(a.clone(), number, format!("https://issues/{number}"))
                    }
                })
                .take(self.result_limit.unwrap_or(usize::MAX))
                .collect())
        }

        async fn publish_category_batch(
            &self,
            groups: &[CategoryGroup],
            _dry_run: bool,
        ) -> Result<Vec<CategoryPublishResult>, StageError> {
            self.category_batches.lock().unwrap().push(groups.to_vec());
            if self.fail_category_batch {
                return Err(StageError::msg("GitHub API unavailable"));
            }
            Ok(groups
                .iter()
                .map(|g| {
                    if self.failing_categories.contains(&g.category) {
                        CategoryPublishResult {
                            error_message: Some("label does not exist".to_string()),
                            ..CategoryPublishResult::for_group(g, PublicationStatus::Failed)
                        }
                    } else {
                        CategoryPublishResult::for_group(g, PublicationStatus::Success)
                    }
                })
                .take(self.result_limit.unwrap_or(usize::MAX))
                .collect())
        }
    }

    struct CountingGrouper {
        inner: CategoryGrouper,
        calls: AtomicUsize,
    }

    impl Grouper for CountingGrouper {
        fn group(&self, articles: &[SummarizedArticle]) -> Vec<CategoryGroup> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.group(articles)
        }
    }

    #[derive(Default)]
    struct FakeExporter {
        failing: HashSet<String>,
        exported: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Exporter for FakeExporter {
        async fn export(&self, group: &CategoryGroup, export_dir: &Path) -> Result<PathBuf, StageError> {
            if self.failing.contains(&group.category) {
                return Err(StageError::msg("disk full"));
            }
            self.exported.lock().unwrap().push(group.title.clone());
            Ok(export_dir.join(format!("{}.md", group.category)))
        }
    }

    fn orchestrator(
        articles: Vec<CollectedArticle>,
        extractor: FakeExtractor,
        summarizer: FakeSummarizer,
        publisher: Arc<FakePublisher>,
        mode: PublishMode,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(FakeCollector(Ok(articles))),
            Arc::new(extractor),
            Arc::new(summarizer),
            publisher,
            mode,
        )
    }

    #[tokio::test]
    async fn test_extraction_failure_is_isolated() {
        let publisher = Arc::new(FakePublisher::default());
        let extractor = FakeExtractor {
            failing: ["https://a.com/2".to_string()].into(),
            ..Default::default()
        };
        let o = orchestrator(
            vec![
                article("https://a.com/1", "tech"),
                article("https://a.com/2", "tech"),
                article("https://b.com/1", "tech"),
            ],
            extractor,
            FakeSummarizer::default(),
            publisher.clone(),
            PublishMode::default(),
        );

        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.total_collected, 3);
        assert_eq!(r.total_extracted, 2);
        assert_eq!(r.extraction_failures.len(), 1);
        assert_eq!(r.extraction_failures[0].url, "https://a.com/2");
        assert_eq!(r.extraction_failures[0].stage, "extraction");
        assert_eq!(r.total_summarized, 2);
        assert_eq!(r.total_published, 2);
        assert!(r.category_results.is_empty());

        let stages: Vec<&str> = r.stage_metrics.iter().map(|m| m.stage.as_str()).collect();
        assert_eq!(stages, vec!["collection", "extraction", "summarization", "publishing"]);
    }

    #[tokio::test]
    async fn test_extractor_errors_are_recorded_not_raised() {
        let extractor = FakeExtractor {
            erroring: ["https://a.com/1".to_string()].into(),
            ..Default::default()
        };
        let o = orchestrator(
            vec![article("https://a.com/1", "tech"), article("https://a.com/2", "tech")],
            extractor,
            FakeSummarizer::default(),
            Arc::new(FakePublisher::default()),
            PublishMode::default(),
        );
        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.total_extracted, 1);
        assert_eq!(r.extraction_failures[0].error, "connection reset");
    }

    #[tokio::test]
    async fn test_duplicate_urls_are_excluded_from_publishing() {
        let publisher = Arc::new(FakePublisher {
            existing: ["https://a.com/1/".to_string()].into(),
            ..Default::default()
        });
        let o = orchestrator(
            vec![article("https://a.com/1", "tech"), article("https://a.com/2", "tech")],
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher.clone(),
            PublishMode::default(),
        );

        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.total_published, 1);
        assert_eq!(r.total_duplicates, 1);
        assert_eq!(r.published_articles.len(), 2);
        assert_eq!(
            r.published_articles[0].publication_status,
            PublicationStatus::Duplicate
        );
        assert_eq!(r.published_articles[1].issue_number, Some(100));

        let batches = publisher.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, vec!["https://a.com/2"]);
    }

    #[tokio::test]
    async fn test_per_category_publishes_one_unit_per_group() {
        let publisher = Arc::new(FakePublisher::default());
        let grouper = Arc::new(CountingGrouper {
            inner: CategoryGrouper::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        });
        let o = orchestrator(
            vec![article("https://a.com/1", "tech"), article("https://b.com/1", "tech")],
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher.clone(),
            PublishMode::PerCategory {
                grouper: grouper.clone(),
                exporter: None,
            },
        );

        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(grouper.calls.load(Ordering::SeqCst), 1);
        let batches = publisher.category_batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert!(publisher.batches.lock().unwrap().is_empty());

        assert_eq!(r.category_results.len(), 1);
        assert_eq!(r.category_results[0].article_count, 2);
        assert_eq!(r.category_results[0].status, PublicationStatus::Success);
        assert_eq!(r.total_published, 2);
        assert!(r.published_articles.is_empty());
    }

    #[tokio::test]
    async fn test_per_article_mode_never_publishes_categories() {
        let publisher = Arc::new(FakePublisher::default());
        let o = orchestrator(
            vec![article("https://a.com/1", "tech"), article("https://b.com/1", "tech")],
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher.clone(),
            PublishMode::default(),
        );
        o.run(&RunOptions::default()).await.unwrap();
        assert!(publisher.category_batches.lock().unwrap().is_empty());
        assert_eq!(publisher.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_export_only_exports_without_publishing() {
        let publisher = Arc::new(FakePublisher::default());
        let exporter = Arc::new(FakeExporter::default());
        let o = orchestrator(
            vec![article("https://a.com/1", "tech"), article("https://b.com/1", "world")],
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher.clone(),
            PublishMode::PerCategory {
                grouper: Arc::new(CategoryGrouper::new(HashMap::new())),
                exporter: Some((exporter.clone() as Arc<dyn Exporter>, PathBuf::from("/tmp/exports"))),
            },
        );

        let opts = RunOptions {
            export_only: true,
            ..Default::default()
        };
        let r = o.run(&opts).await.unwrap();
        assert_eq!(exporter.exported.lock().unwrap().len(), 2);
        assert!(publisher.category_batches.lock().unwrap().is_empty());
        assert_eq!(r.total_published, 0);
        assert!(
            r.category_results
                .iter()
                .all(|c| c.status == PublicationStatus::Skipped && c.export_path.is_some())
        );
        assert!(!r.stage_metrics.iter().any(|m| m.stage == "publishing"));
    }

    #[tokio::test]
    async fn test_zero_collected_still_measures_collection() {
        let o = orchestrator(
            vec![],
            FakeExtractor::default(),
            FakeSummarizer::default(),
            Arc::new(FakePublisher::default()),
            PublishMode::default(),
        );
        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.total_collected, 0);
        assert!(!r.stage_metrics.is_empty());
        assert_eq!(r.stage_metrics[0].stage, "collection");
        assert!(r.stage_metrics[0].elapsed_seconds >= 0.0);
        assert!(r.domain_extraction_rates.is_empty());
    }

    #[tokio::test]
    async fn test_status_filter_and_cap_preserve_order() {
        let extractor = FakeExtractor::default();
        let o = Orchestrator::new(
            Arc::new(FakeCollector(Ok(vec![
                article("https://a.com/1", "tech"),
                article("https://a.com/2", "sports"),
                article("https://a.com/3", "tech"),
                article("https://a.com/4", "unmapped"),
                article("https://a.com/5", "world"),
            ]))),
            Arc::new(extractor),
            Arc::new(FakeSummarizer::default()),
            Arc::new(FakePublisher::default()),
            PublishMode::default(),
        )
        .with_category_status(HashMap::from([
            ("tech".to_string(), "Todo".to_string()),
            ("world".to_string(), "todo".to_string()),
            ("sports".to_string(), "Backlog".to_string()),
        ]));

        let opts = RunOptions {
            statuses: Some(vec!["Todo".to_string()]),
            max_articles: Some(2),
            ..Default::default()
        };
        let r = o.run(&opts).await.unwrap();
        assert_eq!(r.total_collected, 5);
        let urls: Vec<&str> = r.published_articles.iter().map(|p| p.url()).collect();
        assert_eq!(urls, vec!["https://a.com/1", "https://a.com/3"]);
        assert_eq!(r.total_extracted + r.extraction_failures.len(), 2);
    }

    #[tokio::test]
    async fn test_status_filter_without_mapping_is_invalid_config() {
        let o = orchestrator(
            vec![],
            FakeExtractor::default(),
            FakeSummarizer::default(),
            Arc::new(FakePublisher::default()),
            PublishMode::default(),
        );
        let opts = RunOptions {
            statuses: Some(vec!["Todo".to_string()]),
            ..Default::default()
        };
        let err = o.run(&opts).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_collection_error_propagates() {
        let o = Orchestrator::new(
            Arc::new(FakeCollector(Err("registry unreadable".to_string()))),
            Arc::new(FakeExtractor::default()),
            Arc::new(FakeSummarizer::default()),
            Arc::new(FakePublisher::default()),
            PublishMode::default(),
        );
        let err = o.run(&RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Collection(_)));
    }

    #[tokio::test]
    async fn test_summarizer_failures_are_recorded() {
        let summarizer = FakeSummarizer {
            failing: ["https://a.com/1".to_string()].into(),
            ..Default::default()
        };
        let o = orchestrator(
            vec![article("https://a.com/1", "tech"), article("https://a.com/2", "tech")],
            FakeExtractor::default(),
            summarizer,
            Arc::new(FakePublisher::default()),
            PublishMode::default(),
        );
        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.total_summarized, 1);
        assert_eq!(r.summarization_failures.len(), 1);
        assert_eq!(r.summarization_failures[0].error, "empty completion");
        assert_eq!(r.total_published, 1);
    }

    #[tokio::test]
    async fn test_summarizer_batch_error_does_not_escape() {
        let summarizer = FakeSummarizer {
            batch_error: true,
            ..Default::default()
        };
        let publisher = Arc::new(FakePublisher::default());
        let o = orchestrator(
            vec![article("https://a.com/1", "tech"), article("https://a.com/2", "tech")],
            FakeExtractor::default(),
            summarizer,
            publisher.clone(),
            PublishMode::default(),
        );
        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.total_extracted, 2);
        assert_eq!(r.total_summarized, 0);
        assert_eq!(r.summarization_failures.len(), 2);
        assert!(publisher.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_batch_error_becomes_failures() {
        let publisher = Arc::new(FakePublisher {
            fail_batch: true,
            ..Default::default()
        });
        let o = orchestrator(
            vec![article("https://a.com/1", "tech")],
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher,
            PublishMode::default(),
        );
        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.total_published, 0);
        assert_eq!(r.publication_failures.len(), 1);
        assert_eq!(r.publication_failures[0].error, "API rate limit exceeded");
    }

    #[tokio::test]
    async fn test_dry_run_is_forwarded_and_stages_still_run() {
        let publisher = Arc::new(FakePublisher::default());
        let extractor = FakeExtractor::default();
        let o = orchestrator(
            vec![article("https://a.com/1", "tech")],
            extractor,
            FakeSummarizer::default(),
            publisher.clone(),
            PublishMode::default(),
        );
        let opts = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let r = o.run(&opts).await.unwrap();
        assert_eq!(r.total_summarized, 1);
        assert_eq!(r.total_published, 0);
        assert_eq!(
            r.published_articles[0].publication_status,
            PublicationStatus::Skipped
        );
        assert!(publisher.batches.lock().unwrap()[0].1);
    }

    fn category_mode(exporter: Option<Arc<FakeExporter>>) -> PublishMode {
        PublishMode::PerCategory {
            grouper: Arc::new(CategoryGrouper::new(HashMap::new())),
            exporter: exporter.map(|e| (e as Arc<dyn Exporter>, PathBuf::from("/tmp/exports"))),
        }
    }

    fn mixed_categories() -> Vec<CollectedArticle> {
        vec![
            article("https://a.com/1", "tech"),
            article("https://a.com/2", "world"),
            article("https://b.com/1", "tech"),
        ]
    }

    #[tokio::test]
    async fn test_failed_group_yields_one_failure_per_member() {
        let publisher = Arc::new(FakePublisher {
            failing_categories: ["tech".to_string()].into(),
            ..Default::default()
        });
        let o = orchestrator(
            mixed_categories(),
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher,
            category_mode(None),
        );

        let r = o.run(&RunOptions::default()).await.unwrap();
        let statuses: Vec<(&str, PublicationStatus)> = r
            .category_results
            .iter()
            .map(|c| (c.category.as_str(), c.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("tech", PublicationStatus::Failed),
                ("world", PublicationStatus::Success)
            ]
        );
        let failed: Vec<(&str, &str, &str)> = r
            .publication_failures
            .iter()
            .map(|f| (f.stage.as_str(), f.url.as_str(), f.error.as_str()))
            .collect();
        assert_eq!(
            failed,
            vec![
                ("publishing", "https://a.com/1", "label does not exist"),
                ("publishing", "https://b.com/1", "label does not exist"),
            ]
        );
        assert_eq!(r.total_published, 1);
    }

    #[tokio::test]
    async fn test_export_error_yields_one_failure_per_member() {
        let exporter = Arc::new(FakeExporter {
            failing: ["tech".to_string()].into(),
            ..Default::default()
        });
        let o = orchestrator(
            mixed_categories(),
            FakeExtractor::default(),
            FakeSummarizer::default(),
            Arc::new(FakePublisher::default()),
            category_mode(Some(exporter.clone())),
        );

        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.export_failures.len(), 2);
        assert!(r.export_failures.iter().all(|f| f.stage == "export" && f.error == "disk full"));
        let urls: Vec<&str> = r.export_failures.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/1", "https://b.com/1"]);

        // The failed export does not stop publishing.
        assert_eq!(exporter.exported.lock().unwrap().len(), 1);
        assert!(r.category_results.iter().all(|c| c.status == PublicationStatus::Success));
        assert!(r.category_results[0].export_path.is_none());
        assert!(r.category_results[1].export_path.is_some());
        assert!(r.publication_failures.is_empty());
    }

    #[tokio::test]
    async fn test_short_publisher_results_fail_the_rest() {
        let publisher = Arc::new(FakePublisher {
            result_limit: Some(1),
            ..Default::default()
        });
        let o = orchestrator(
            vec![article("https://a.com/1", "tech"), article("https://a.com/2", "tech")],
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher,
            PublishMode::default(),
        );
        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.total_published, 1);
        assert_eq!(r.published_articles[1].publication_status, PublicationStatus::Failed);
        assert_eq!(r.publication_failures.len(), 1);
        assert_eq!(r.publication_failures[0].url, "https://a.com/2");
        assert_eq!(r.publication_failures[0].error, "publisher returned no result");

        let publisher = Arc::new(FakePublisher {
            result_limit: Some(1),
            ..Default::default()
        });
        let o = orchestrator(
            mixed_categories(),
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher,
            category_mode(None),
        );
        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.category_results[0].status, PublicationStatus::Success);
        assert_eq!(r.category_results[1].status, PublicationStatus::Failed);
        assert_eq!(
            r.category_results[1].error_message.as_deref(),
            Some("publisher returned no result")
        );
        assert_eq!(r.publication_failures.len(), 1);
        assert_eq!(r.publication_failures[0].url, "https://a.com/2");
    }

    #[tokio::test]
    async fn test_category_batch_error_fails_every_group() {
        let publisher = Arc::new(FakePublisher {
            fail_category_batch: true,
            ..Default::default()
        });
        let o = orchestrator(
            mixed_categories(),
            FakeExtractor::default(),
            FakeSummarizer::default(),
            publisher,
            category_mode(None),
        );

        let r = o.run(&RunOptions::default()).await.unwrap();
        assert_eq!(r.category_results.len(), 2);
        assert!(r.category_results.iter().all(|c| {
            c.status == PublicationStatus::Failed
                && c.error_message.as_deref() == Some("GitHub API unavailable")
        }));
        assert_eq!(r.publication_failures.len(), 3);
        assert_eq!(r.total_published, 0);
        assert!(r.stage_metrics.iter().any(|m| m.stage == "publishing"));
    }
}
