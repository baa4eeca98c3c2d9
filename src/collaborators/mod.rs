//! Concrete implementations of the pipeline collaborator traits.
//!
//! | Stage         | Implementation            | Backed by                      |
//! |---------------|---------------------------|--------------------------------|
//! | Collection    | [`FeedCollector`]         | feed fetcher + item store      |
//! | Extraction    | [`AccessibilityExtractor`]| tiered content checker         |
//! | Summarization | [`LlmSummarizer`]         | OpenAI-compatible chat API     |
//! | Grouping      | [`CategoryGrouper`]       | in-memory                      |
//! | Publishing    | [`GithubPublisher`]       | GitHub REST issues             |
//!
//! The Markdown exporter lives with the other writers in
//! [`crate::outputs::markdown`].

pub mod content_extractor;
pub mod feed_collector;
pub mod github;
pub mod grouper;
pub mod summarizer;

pub use content_extractor::AccessibilityExtractor;
pub use feed_collector::FeedCollector;
pub use github::{GithubConnection, GithubPublisher};
pub use grouper::CategoryGrouper;
pub use summarizer::{DEFAULT_SYSTEM_PROMPT, LlmSummarizer};
