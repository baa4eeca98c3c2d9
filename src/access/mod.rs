//! Content accessibility checking.
//!
//! Decides whether an article's body text is reachable, escalating through
//! cheaper strategies first:
//!
//! 1. **Tier 1**: static HTTP fetch + container-based text extraction. A
//!    fetch error ends the check with `FETCH_ERROR`.
//! 2. **Tier 2**: headless-browser render, only when Tier 1 text is shorter
//!    than `min_content_length`. Render failures fall back to Tier 1 text.
//! 3. **Tier 3**: paywall heuristic over the longest text, applied whenever
//!    that text is long enough to be an article.

pub mod extract;
pub mod paywall;
pub mod tiers;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub use extract::extract_text;
pub use paywall::{PaywallDetector, PaywallIndicators, PaywallVerdict};
pub use tiers::{BrowserlessRenderer, HttpPageFetcher, NoRenderer, PageFetcher, PageRenderer};

/// Minimum number of characters for text to count as an article body.
pub const MIN_CONTENT_LENGTH: usize = 200;

/// Text length at which the paywall heuristic stops flagging content.
pub const LENIENT_CONTENT_LENGTH: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessStatus {
    Accessible,
    Paywalled,
    Insufficient,
    FetchError,
}

/// Outcome of one accessibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCheckResult {
    pub status: AccessStatus,
    /// Length of `raw_text` in characters.
    pub content_length: usize,
    pub raw_text: String,
    pub reason: String,
    pub tier_used: u8,
    pub fallback_count: u32,
}

impl ContentCheckResult {
    pub fn is_accessible(&self) -> bool {
        self.status == AccessStatus::Accessible
    }
}

/// Tiered accessibility checker over a static fetcher and a renderer.
#[derive(Debug, Clone)]
pub struct ContentChecker<F, R> {
    fetcher: F,
    renderer: R,
    detector: PaywallDetector,
    min_content_length: usize,
}

impl<F: PageFetcher, R: PageRenderer> ContentChecker<F, R> {
    pub fn new(fetcher: F, renderer: R, detector: PaywallDetector, min_content_length: usize) -> Self {
        Self {
            fetcher,
            renderer,
            detector,
            min_content_length,
        }
    }

    /// Classify the reachability of the article at `url`.
    #[instrument(level = "info", skip(self))]
    pub async fn check(&self, url: &str) -> ContentCheckResult {
        let html = match self.fetcher.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "Tier 1 fetch failed");
                return ContentCheckResult {
                    status: AccessStatus::FetchError,
                    content_length: 0,
                    raw_text: String::new(),
                    reason: format!("Tier 1: fetch error ({e})"),
                    tier_used: 1,
                    fallback_count: 0,
                };
            }
        };

        let tier1_text = extract_text(&html);
        let tier1_len = tier1_text.chars().count();
        if tier1_len >= self.min_content_length {
            return self.classify(tier1_text, tier1_len, 1, 0);
        }

        debug!(%url, tier1_len, "Tier 1 text too short; trying rendered fetch");
        let (text, len, tier) = match self.renderer.render_html(url).await {
            Ok(rendered) => {
                let tier2_text = extract_text(&rendered);
                let tier2_len = tier2_text.chars().count();
                if tier2_len > tier1_len {
                    (tier2_text, tier2_len, 2)
                } else {
                    (tier1_text, tier1_len, 1)
                }
            }
            Err(e) => {
                warn!(%url, error = %e, "Tier 2 render failed; keeping Tier 1 text");
                (tier1_text, tier1_len, 1)
            }
        };

        if len < self.min_content_length {
            info!(%url, tier, len, "Insufficient content");
            return ContentCheckResult {
                status: AccessStatus::Insufficient,
                content_length: len,
                raw_text: text,
                reason: format!(
                    "Tier {tier}: insufficient content ({len} chars < {})",
                    self.min_content_length
                ),
                tier_used: tier,
                fallback_count: 1,
            };
        }

        self.classify(text, len, tier, 1)
    }

    fn classify(&self, text: String, len: usize, tier: u8, fallback_count: u32) -> ContentCheckResult {
        let verdict = self.detector.detect(&text);
        if verdict.paywalled {
            info!(len, matched = ?verdict.matched, "Paywall detected");
            return ContentCheckResult {
                status: AccessStatus::Paywalled,
                content_length: len,
                raw_text: text,
                reason: format!("Tier 3: paywall detected ({})", verdict.matched.join(", ")),
                tier_used: 3,
                fallback_count,
            };
        }
        ContentCheckResult {
            status: AccessStatus::Accessible,
            content_length: len,
            raw_text: text,
            reason: format!("Tier {tier}: success ({len} chars)"),
            tier_used: tier,
            fallback_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, RenderError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(body_text: &str) -> String {
        format!("<html><body><article><p>{body_text}</p></article></body></html>")
    }

    fn prose(len: usize) -> String {
        "The council voted on the new budget. "
            .chars()
            .cycle()
            .take(len)
            .collect::<String>()
            .trim_end()
            .to_string()
            + "."
    }

    enum Tier1 {
        Html(String),
        Status(u16),
    }

    struct FakeFetcher(Tier1);

    impl PageFetcher for FakeFetcher {
        async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
            match &self.0 {
                Tier1::Html(html) => Ok(html.clone()),
                Tier1::Status(status) => Err(FetchError::Http {
                    url: url.to_string(),
                    status: *status,
                }),
            }
        }
    }

    struct FakeRenderer {
        html: Option<String>,
        calls: AtomicUsize,
    }

    impl FakeRenderer {
        fn returning(html: Option<String>) -> Self {
            Self {
                html,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PageRenderer for FakeRenderer {
        async fn render_html(&self, _url: &str) -> Result<String, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.html
                .clone()
                .ok_or_else(|| RenderError::Unavailable("browser crashed".to_string()))
        }
    }

    fn checker(t1: Tier1, t2: Option<String>) -> ContentChecker<FakeFetcher, FakeRenderer> {
        ContentChecker::new(
            FakeFetcher(t1),
            FakeRenderer::returning(t2),
            PaywallDetector::default(),
            MIN_CONTENT_LENGTH,
        )
    }

    #[tokio::test]
    async fn test_long_static_text_is_accessible_on_tier1() {
        let c = checker(Tier1::Html(page(&prose(1000))), None);
        let r = c.check("https://example.com/a").await;
        assert_eq!(r.status, AccessStatus::Accessible);
        assert_eq!(r.tier_used, 1);
        assert_eq!(r.fallback_count, 0);
        assert_eq!(r.content_length, r.raw_text.chars().count());
        assert!(r.reason.starts_with("Tier 1: success"));
        assert_eq!(c.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_short_static_text_falls_back_to_render() {
        let c = checker(Tier1::Html(page(&prose(50))), Some(page(&prose(1000))));
        let r = c.check("https://example.com/a").await;
        assert_eq!(r.status, AccessStatus::Accessible);
        assert_eq!(r.tier_used, 2);
        assert_eq!(r.fallback_count, 1);
        assert!(r.content_length >= 1000);
    }

    #[tokio::test]
    async fn test_both_tiers_short_is_insufficient() {
        let c = checker(Tier1::Html(page(&prose(50))), Some(page(&prose(120))));
        let r = c.check("https://example.com/a").await;
        assert_eq!(r.status, AccessStatus::Insufficient);
        assert_eq!(r.tier_used, 2);
        assert_eq!(r.fallback_count, 1);
    }

    #[tokio::test]
    async fn test_render_failure_keeps_tier1_text() {
        let c = checker(Tier1::Html(page(&prose(80))), None);
        let r = c.check("https://example.com/a").await;
        assert_eq!(r.status, AccessStatus::Insufficient);
        assert_eq!(r.tier_used, 1);
        assert_eq!(r.fallback_count, 1);
        assert_eq!(c.renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_404_is_fetch_error_without_render() {
        let c = checker(Tier1::Status(404), Some(page(&prose(1000))));
        let r = c.check("https://example.com/missing").await;
        assert_eq!(r.status, AccessStatus::FetchError);
        assert_eq!(r.tier_used, 1);
        assert_eq!(r.fallback_count, 0);
        assert!(r.reason.contains("404"));
        assert_eq!(c.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_paywalled_medium_text_reports_tier3() {
        let text = format!(
            "Members only. Already a subscriber? Sign in. {}",
            prose(500)
        );
        let c = checker(Tier1::Html(page(&text)), None);
        let r = c.check("https://example.com/a").await;
        assert_eq!(r.status, AccessStatus::Paywalled);
        assert_eq!(r.tier_used, 3);
        assert_eq!(r.fallback_count, 0);
        assert!(r.reason.starts_with("Tier 3: paywall detected"));
    }

    #[tokio::test]
    async fn test_long_text_with_indicators_is_accessible() {
        let text = format!("Members only. Already a subscriber? {}", prose(1600));
        let c = checker(Tier1::Html(page(&text)), None);
        let r = c.check("https://example.com/a").await;
        assert_eq!(r.status, AccessStatus::Accessible);
        assert_eq!(r.tier_used, 1);
    }

    #[tokio::test]
    async fn test_rendered_paywall_reports_tier3_after_fallback() {
        let rendered = format!(
            "Members only. Already a subscriber? Sign in. {}",
            prose(500)
        );
        let c = checker(Tier1::Html(page(&prose(40))), Some(page(&rendered)));
        let r = c.check("https://example.com/a").await;
        assert_eq!(r.status, AccessStatus::Paywalled);
        assert_eq!(r.tier_used, 3);
        assert_eq!(r.fallback_count, 1);
        assert!(r.raw_text.starts_with("Members only."));
        assert_eq!(c.renderer.calls.load(Ordering::SeqCst), 1);
    }
}
