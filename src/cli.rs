//! Command-line interface definitions.
//!
//! Secrets can be passed as flags or through the environment.
//!
//! ```sh
//! # Full run, publishing one digest per category and date
//! awful_news_pipeline --config config.yaml run --statuses Todo,Doing --max-articles 50
//!
//! # Only refresh feeds
//! awful_news_pipeline fetch --category tech
//!
//! # Check a single article
//! awful_news_pipeline check https://example.com/story
//! ```

use crate::pipeline::RunOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.yaml (defaults to ./config.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// GitHub token used to read and create issues
    #[arg(long, env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    pub github_token: Option<String>,

    /// API key for the summarization endpoint
    #[arg(long, env = "LLM_API_KEY", global = true, hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Token for the Browserless rendering endpoint
    #[arg(long, env = "BROWSERLESS_TOKEN", global = true, hide_env_values = true)]
    pub browserless_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect, extract, summarize and publish
    Run(RunArgs),

    /// Fetch feeds and update the item store only
    Fetch {
        /// Only fetch feeds in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Check whether one article's content is accessible
    Check {
        url: String,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Only process categories whose configured status is one of these
    #[arg(long, value_delimiter = ',')]
    pub statuses: Option<Vec<String>>,

    /// Process at most this many collected articles
    #[arg(long)]
    pub max_articles: Option<usize>,

    /// Run every stage but do not create issues
    #[arg(long)]
    pub dry_run: bool,

    /// Export category digests without publishing them
    #[arg(long)]
    pub export_only: bool,
}

impl RunArgs {
    pub fn to_options(&self) -> RunOptions {
        RunOptions {
            statuses: self.statuses.clone(),
            max_articles: self.max_articles,
            dry_run: self.dry_run,
            export_only: self.export_only,
        }
    }
}
