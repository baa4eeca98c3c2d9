//! Fetch strategies behind the accessibility tiers.
//!
//! Tier 1 is a plain HTTP GET ([`HttpPageFetcher`]). Tier 2 asks a headless
//! browser for the rendered DOM; [`BrowserlessRenderer`] talks to a
//! Browserless `/content` endpoint and [`NoRenderer`] stands in when no
//! browser is configured.

use crate::error::{FetchError, RenderError};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

/// Tier 1: fetch raw HTML.
pub trait PageFetcher: Send + Sync {
    fn fetch_html(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Tier 2: fetch fully rendered HTML.
pub trait PageRenderer: Send + Sync {
    fn render_html(&self, url: &str) -> impl Future<Output = Result<String, RenderError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(network)?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Client for a Browserless `/content` endpoint.
#[derive(Debug, Clone)]
pub struct BrowserlessRenderer {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessRenderer {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }
}

impl PageRenderer for BrowserlessRenderer {
    #[instrument(level = "debug", skip(self))]
    async fn render_html(&self, url: &str) -> Result<String, RenderError> {
        let endpoint = format!("{}/content", self.base_url);
        let mut request = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "url": url }));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RenderError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.text().await?)
    }
}

/// An optional renderer; `None` behaves like [`NoRenderer`].
impl<R: PageRenderer> PageRenderer for Option<R> {
    async fn render_html(&self, url: &str) -> Result<String, RenderError> {
        match self {
            Some(renderer) => renderer.render_html(url).await,
            None => NoRenderer.render_html(url).await,
        }
    }
}

/// Renderer used when no headless browser is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

impl PageRenderer for NoRenderer {
    async fn render_html(&self, _url: &str) -> Result<String, RenderError> {
        Err(RenderError::Unavailable(
            "no headless browser configured".to_string(),
        ))
    }
}
