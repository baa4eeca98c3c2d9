//! LLM-backed summarizer.
//!
//! Articles are summarized with at most `concurrency` requests in flight.
//! Outputs keep input order, and a request that fails after all retries
//! turns into a FAILED summary for that one article.

use crate::error::StageError;
use crate::llm::{AskAsync, RetryAsk};
use crate::pipeline::{ExtractedArticle, SummarizedArticle, Summarizer};
use async_trait::async_trait;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// System prompt used when the configuration does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a news editor. Summarize the article you are given \
in three to five plain sentences. Keep names, numbers and dates accurate. Do not add opinions.";

pub struct LlmSummarizer<A> {
    client: RetryAsk<A>,
    concurrency: usize,
    max_input_chars: usize,
}

impl<A: AskAsync<Response = String>> LlmSummarizer<A> {
    pub fn new(client: RetryAsk<A>, concurrency: usize, max_input_chars: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            max_input_chars,
        }
    }

    async fn summarize_one(&self, article: &ExtractedArticle) -> SummarizedArticle {
        let prompt = build_prompt(article, self.max_input_chars);
        match self.client.ask(&prompt).await {
            Ok(summary) => SummarizedArticle::success(article.clone(), summary),
            Err(e) => {
                warn!(url = %article.url(), error = %e, "Summarization failed");
                SummarizedArticle::failed(article.clone(), e.to_string())
            }
        }
    }
}

/// Title, source and body, with the body cut to `max_chars` characters.
fn build_prompt(article: &ExtractedArticle, max_chars: usize) -> String {
    let body: String = article.body_text.chars().take(max_chars).collect();
    format!(
        "Title: {}\nSource: {}\nURL: {}\n\n{}",
        article.article.title,
        article.article.source,
        article.url(),
        body
    )
}

#[async_trait]
impl<A: AskAsync<Response = String>> Summarizer for LlmSummarizer<A> {
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), concurrency = self.concurrency))]
    async fn summarize_batch(
        &self,
        articles: &[ExtractedArticle],
    ) -> Result<Vec<SummarizedArticle>, StageError> {
        let t0 = Instant::now();
        let pending: Vec<_> = articles
            .iter()
            .map(|article| self.summarize_one(article).boxed())
            .collect();
        let results: Vec<SummarizedArticle> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        info!(
            summarized = results.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Summarization batch finished"
        );
        Ok(results)
    }
}
