//! Extractor backed by the tiered accessibility checker.

use crate::access::{ContentChecker, PageFetcher, PageRenderer};
use crate::error::StageError;
use crate::pipeline::{CollectedArticle, ExtractedArticle, Extractor};
use async_trait::async_trait;

/// Accessible pages become SUCCESS with the checker's text; paywalled,
/// insufficient and unreachable pages become FAILED with its reason.
pub struct AccessibilityExtractor<F, R> {
    checker: ContentChecker<F, R>,
}

impl<F: PageFetcher, R: PageRenderer> AccessibilityExtractor<F, R> {
    pub fn new(checker: ContentChecker<F, R>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl<F: PageFetcher, R: PageRenderer> Extractor for AccessibilityExtractor<F, R> {
    async fn extract(&self, article: &CollectedArticle) -> Result<ExtractedArticle, StageError> {
        let result = self.checker.check(&article.url).await;
        if result.is_accessible() {
            Ok(ExtractedArticle::success(article.clone(), result.raw_text))
        } else {
            Ok(ExtractedArticle::failed(article.clone(), result.reason))
        }
    }
}
