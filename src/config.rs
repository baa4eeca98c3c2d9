//! YAML configuration.
//!
//! Every key is optional; an empty file yields [`AppConfig::default`].
//! Secrets (GitHub token, LLM API key, Browserless token) are not read from
//! this file; they come from the command line or environment.
//!
//! ```yaml
//! registry_path: data/feeds.json
//! max_concurrent: 5
//! publish_mode: per_category
//! export_dir: exports
//! category_labels:
//!   tech: Technology
//! category_status:
//!   tech: Todo
//! github:
//!   owner: acme
//!   repo: newsroom
//! feeds:
//!   - id: hn
//!     url: https://news.ycombinator.com/rss
//!     category: tech
//! ```

use crate::access::{LENIENT_CONTENT_LENGTH, MIN_CONTENT_LENGTH, PaywallIndicators};
use crate::collaborators::DEFAULT_SYSTEM_PROMPT;
use crate::collaborators::github::DEFAULT_API_BASE;
use crate::error::PipelineError;
use crate::feeds::Feed;
use crate::pipeline::DEFAULT_DEDUP_DAYS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishModeKind {
    #[default]
    PerArticle,
    PerCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("awful_news_pipeline/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub min_content_length: usize,
    pub lenient_length: usize,
    /// Browserless base URL; Tier 2 is disabled when unset.
    pub browserless_url: Option<String>,
    pub render_timeout_secs: u64,
    /// Replaces the built-in paywall phrases when set.
    pub indicators: Option<PaywallIndicators>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            min_content_length: MIN_CONTENT_LENGTH,
            lenient_length: LENIENT_CONTENT_LENGTH,
            browserless_url: None,
            render_timeout_secs: 60,
            indicators: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// API root of an OpenAI-compatible server.
    pub endpoint: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub concurrency: usize,
    pub max_input_chars: usize,
    pub max_retries: usize,
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.3,
            concurrency: 4,
            max_input_chars: 8000,
            max_retries: 5,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub labels: Vec<String>,
    pub dedup_days: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            owner: String::new(),
            repo: String::new(),
            labels: vec!["news".to_string()],
            dedup_days: DEFAULT_DEDUP_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub registry_path: PathBuf,
    pub item_store_dir: PathBuf,
    pub report_dir: PathBuf,
    pub max_concurrent: usize,
    pub http: HttpConfig,
    pub checker: CheckerConfig,
    pub summarizer: SummarizerConfig,
    pub github: GithubConfig,
    pub publish_mode: PublishModeKind,
    pub export_dir: Option<PathBuf>,
    pub category_labels: HashMap<String, String>,
    pub category_status: HashMap<String, String>,
    /// Merged into the registry at startup.
    pub feeds: Vec<Feed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("data/feeds.json"),
            item_store_dir: PathBuf::from("data/items"),
            report_dir: PathBuf::from("reports"),
            max_concurrent: 5,
            http: HttpConfig::default(),
            checker: CheckerConfig::default(),
            summarizer: SummarizerConfig::default(),
            github: GithubConfig::default(),
            publish_mode: PublishModeKind::default(),
            export_dir: None,
            category_labels: HashMap::new(),
            category_status: HashMap::new(),
            feeds: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::InvalidConfig(format!("failed to parse YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate the file at `path`.
    pub async fn load(path: &Path) -> Result<Self, PipelineError> {
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
            PipelineError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml(&yaml)?;
        info!(path = %path.display(), feeds = config.feeds.len(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` when given; otherwise `config.yaml` if present, else
    /// defaults.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, PipelineError> {
        match path {
            Some(path) => Self::load(path).await,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if tokio::fs::try_exists(default_path).await.unwrap_or(false) {
                    Self::load(default_path).await
                } else {
                    info!("No configuration file; using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::InvalidConfig(msg.to_string()));
        if self.max_concurrent == 0 {
            return invalid("max_concurrent must be at least 1");
        }
        if self.summarizer.concurrency == 0 {
            return invalid("summarizer.concurrency must be at least 1");
        }
        if self.checker.min_content_length == 0 {
            return invalid("checker.min_content_length must be at least 1");
        }
        if self.checker.lenient_length < self.checker.min_content_length {
            return invalid("checker.lenient_length must not be below checker.min_content_length");
        }
        if let Some(feed) = self.feeds.iter().find(|f| f.id.trim().is_empty() || f.url.trim().is_empty()) {
            return Err(PipelineError::InvalidConfig(format!(
                "feed definition needs both id and url (got id={:?}, url={:?})",
                feed.id, feed.url
            )));
        }
        Ok(())
    }
}
