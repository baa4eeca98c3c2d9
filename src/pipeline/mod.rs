//! The staged article pipeline: collection, extraction, summarization and
//! publishing, plus the result model a run produces.
//!
//! The [`Orchestrator`] only talks to the collaborator traits in [`traits`];
//! concrete implementations live in [`crate::collaborators`].

pub mod models;
pub mod orchestrator;
pub mod result;
pub mod traits;

pub use models::{
    CategoryGroup, CategoryPublishResult, CollectedArticle, ExtractedArticle, ExtractionStatus,
    PublicationStatus, PublishedArticle, SummarizationStatus, SummarizedArticle,
};
pub use orchestrator::{DEFAULT_DEDUP_DAYS, Orchestrator, PublishMode, RunOptions};
pub use result::{DomainExtractionRate, FailureRecord, StageMetrics, StageOutputs, WorkflowResult};
pub use traits::{Collector, Exporter, Extractor, Grouper, Publisher, Summarizer, normalize_url};
