//! # Awful News Pipeline
//!
//! Fetches RSS/Atom feeds, decides whether each new article's body is
//! actually reachable, summarizes what is, and publishes the results as
//! GitHub issues, one per article or one digest per category and day.
//!
//! ## Architecture
//!
//! 1. **Feeds** ([`feeds`]): registry, per-feed item store and a bounded
//!    concurrent fetcher that reports only newly seen items.
//! 2. **Access** ([`access`]): tiered content checker (static fetch,
//!    headless render, paywall heuristic).
//! 3. **Pipeline** ([`pipeline`]): the sequential orchestrator and its
//!    collaborator traits, result model and run metrics.
//! 4. **Collaborators** ([`collaborators`]): feed collector, accessibility
//!    extractor, LLM summarizer, category grouper, GitHub publisher.
//! 5. **Outputs** ([`outputs`]): Markdown digests and JSON run reports.

pub mod access;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod feeds;
pub mod llm;
pub mod outputs;
pub mod pipeline;
pub mod utils;
