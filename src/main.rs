//! # Awful News Pipeline
//!
//! Binary entry point. See the library docs for the architecture.
//!
//! ## Usage
//!
//! ```sh
//! awful_news_pipeline run
//! awful_news_pipeline fetch --category tech
//! awful_news_pipeline check https://example.com/story
//! ```

use awful_news_pipeline::access::{
    BrowserlessRenderer, ContentChecker, HttpPageFetcher, PaywallDetector,
};
use awful_news_pipeline::cli::{Cli, Command, RunArgs};
use awful_news_pipeline::collaborators::{
    AccessibilityExtractor, CategoryGrouper, FeedCollector, GithubConnection, GithubPublisher,
    LlmSummarizer,
};
use awful_news_pipeline::config::{AppConfig, PublishModeKind};
use awful_news_pipeline::feeds::{FeedFetcher, FeedRegistry, HttpFeedSource, ItemStore};
use awful_news_pipeline::llm::{ChatClient, RetryAsk};
use awful_news_pipeline::outputs::{MarkdownExporter, write_report};
use awful_news_pipeline::pipeline::{Exporter, Orchestrator, PublishMode};
use awful_news_pipeline::utils::ensure_writable_dir;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "awful_news_pipeline starting up");

    let args = Cli::parse();
    debug!(config = ?args.config, command = ?args.command, "Parsed CLI arguments");

    let config = AppConfig::load_or_default(args.config.as_deref()).await?;

    match &args.command {
        Command::Run(run) => run_pipeline(&args, &config, run).await?,
        Command::Fetch { category } => fetch_feeds(&config, category.as_deref()).await?,
        Command::Check { url } => check_url(&args, &config, url).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Registry synced with the configured feed list, plus the item store.
async fn build_feed_fetcher(config: &AppConfig) -> Result<FeedFetcher<HttpFeedSource>, Box<dyn Error>> {
    let registry = FeedRegistry::load(&config.registry_path).await?;
    registry.sync_from_config(&config.feeds).await?;
    info!(
        path = %config.registry_path.display(),
        feeds = registry.list().await.len(),
        "Feed registry ready"
    );

    let source = HttpFeedSource::new(&config.http.user_agent, config.http.timeout())?;
    Ok(FeedFetcher::new(
        source,
        Arc::new(registry),
        ItemStore::new(&config.item_store_dir),
    ))
}

fn build_checker(
    args: &Cli,
    config: &AppConfig,
) -> Result<ContentChecker<HttpPageFetcher, Option<BrowserlessRenderer>>, Box<dyn Error>> {
    let fetcher = HttpPageFetcher::new(&config.http.user_agent, config.http.timeout())?;
    let renderer = match &config.checker.browserless_url {
        Some(base) => Some(BrowserlessRenderer::new(
            base,
            args.browserless_token.as_deref(),
            Duration::from_secs(config.checker.render_timeout_secs),
        )?),
        None => {
            info!("No Browserless endpoint configured; Tier 2 disabled");
            None
        }
    };
    let indicators = config.checker.indicators.clone().unwrap_or_default();
    let detector = PaywallDetector::new(
        &indicators,
        config.checker.min_content_length,
        config.checker.lenient_length,
    );
    Ok(ContentChecker::new(
        fetcher,
        renderer,
        detector,
        config.checker.min_content_length,
    ))
}

#[instrument(level = "info", skip_all)]
async fn run_pipeline(args: &Cli, config: &AppConfig, run: &RunArgs) -> Result<(), Box<dyn Error>> {
    // Early check: ensure the report dir is writable before doing any work
    if let Err(e) = ensure_writable_dir(&config.report_dir).await {
        error!(
            path = %config.report_dir.display(),
            error = %e,
            "Report directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let collector = FeedCollector::new(build_feed_fetcher(config).await?, config.max_concurrent);
    let extractor = AccessibilityExtractor::new(build_checker(args, config)?);

    let s = &config.summarizer;
    let chat = ChatClient::new(
        &s.endpoint,
        &s.model,
        args.llm_api_key.as_deref(),
        &s.system_prompt,
        s.temperature,
        Duration::from_secs(s.timeout_secs),
    )?;
    let summarizer = LlmSummarizer::new(
        RetryAsk::new(chat, s.max_retries, Duration::from_secs(1)),
        s.concurrency,
        s.max_input_chars,
    );

    if args.github_token.is_none() && !run.dry_run && !run.export_only {
        warn!("GITHUB_TOKEN is not set; issue creation will fail");
    }
    let publisher = GithubPublisher::new(
        GithubConnection {
            api_base: config.github.api_base.clone(),
            owner: config.github.owner.clone(),
            repo: config.github.repo.clone(),
            token: args.github_token.clone(),
        },
        config.github.labels.clone(),
        config.github.dedup_days,
        &config.http.user_agent,
    )?;

    let mode = match config.publish_mode {
        PublishModeKind::PerArticle => PublishMode::PerArticle {
            dedup_days: config.github.dedup_days,
        },
        PublishModeKind::PerCategory => {
            let exporter: Arc<dyn Exporter> = Arc::new(MarkdownExporter);
            PublishMode::PerCategory {
                grouper: Arc::new(CategoryGrouper::new(config.category_labels.clone())),
                exporter: config.export_dir.clone().map(|dir| (exporter, dir)),
            }
        }
    };

    let orchestrator = Orchestrator::new(
        Arc::new(collector),
        Arc::new(extractor),
        Arc::new(summarizer),
        Arc::new(publisher),
        mode,
    )
    .with_category_status(config.category_status.clone());

    let result = orchestrator.run(&run.to_options()).await?;

    match write_report(&result, &config.report_dir).await {
        Ok(path) => info!(path = %path.display(), "Run report saved"),
        Err(e) => error!(error = %e, "Failed to write run report"),
    }

    for rate in &result.domain_extraction_rates {
        debug!(
            domain = %rate.domain,
            total = rate.total,
            success_rate = rate.success_rate,
            "Extraction rate"
        );
    }
    info!(
        collected = result.total_collected,
        extracted = result.total_extracted,
        summarized = result.total_summarized,
        published = result.total_published,
        duplicates = result.total_duplicates,
        failures = result.total_failures(),
        elapsed_secs = result.elapsed_seconds,
        "Pipeline summary"
    );
    Ok(())
}

#[instrument(level = "info", skip(config))]
async fn fetch_feeds(config: &AppConfig, category: Option<&str>) -> Result<(), Box<dyn Error>> {
    let fetcher = build_feed_fetcher(config).await?;
    let results = fetcher.fetch_all(category, config.max_concurrent).await;
    for r in &results {
        match &r.error_message {
            None => info!(feed_id = %r.feed_id, items = r.items_count, new = r.new_items, "Feed ok"),
            Some(e) => warn!(feed_id = %r.feed_id, error = %e, "Feed failed"),
        }
    }
    Ok(())
}

#[instrument(level = "info", skip(args, config))]
async fn check_url(args: &Cli, config: &AppConfig, url: &str) -> Result<(), Box<dyn Error>> {
    let checker = build_checker(args, config)?;
    let result = checker.check(url).await;
    info!(
        status = ?result.status,
        tier = result.tier_used,
        fallbacks = result.fallback_count,
        chars = result.content_length,
        reason = %result.reason,
        "Accessibility check"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
