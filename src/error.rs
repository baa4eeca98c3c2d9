//! Error types for feeds, page fetching, rendering and pipeline stages.
//!
//! Failures local to one feed or one article are recovered and reported as
//! data ([`crate::feeds::FetchResult`], [`crate::pipeline::FailureRecord`]).
//! Only collection errors and invalid configuration leave
//! [`crate::pipeline::Orchestrator::run`] as a [`PipelineError`].

use thiserror::Error;

/// Errors raised while fetching, parsing or storing a feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed not found: {feed_id}")]
    NotFound { feed_id: String },

    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tier 1 (static) page fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
}

/// Tier 2 (rendered) page fetch errors. Never escape the checker.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),

    #[error("renderer API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("renderer network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        RenderError::Network(err.to_string())
    }
}

/// A failure reported by a pipeline collaborator (collector, extractor,
/// summarizer, publisher, exporter).
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{0}")]
    Message(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Feed(#[from] FeedError),
}

impl StageError {
    pub fn msg(message: impl Into<String>) -> Self {
        StageError::Message(message.into())
    }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("collection failed: {0}")]
    Collection(#[source] StageError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
