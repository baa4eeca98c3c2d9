//! Publisher that files GitHub issues through the REST API.
//!
//! Duplicate detection reads issues updated within the window: article URLs
//! are scraped from their bodies and their titles are kept for category
//! digests, whose titles are deterministic per (category, date).

use crate::error::StageError;
use crate::outputs::markdown::{render_article, render_group};
use crate::pipeline::{
    CategoryGroup, CategoryPublishResult, PublicationStatus, PublishedArticle, Publisher,
    SummarizedArticle,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const PER_PAGE: usize = 100;
/// Listing stops here, so the duplicate window sees at most
/// `PER_PAGE * MAX_PAGES` issues.
const MAX_PAGES: usize = 10;

// One level of balanced parentheses is part of the URL, e.g.
// `https://en.wikipedia.org/wiki/Rust_(programming_language)`.
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://(?:[^\s<>()\[\]"'`]|\([^\s<>()\[\]"'`]*\))+"#).expect("valid url regex")
});

#[derive(Debug, Deserialize)]
struct Issue {
    title: String,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewIssue<'a> {
    title: &'a str,
    body: &'a str,
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    number: u64,
    html_url: String,
}

/// Issues touched within the duplicate window.
#[derive(Debug, Default, Clone)]
pub struct RecentIssues {
    pub urls: HashSet<String>,
    pub titles: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct GithubConnection {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub token: Option<String>,
}

pub struct GithubPublisher {
    client: Client,
    conn: GithubConnection,
    labels: Vec<String>,
    dedup_days: u32,
}

impl GithubPublisher {
    pub fn new(
        conn: GithubConnection,
        labels: Vec<String>,
        dedup_days: u32,
        user_agent: &str,
    ) -> Result<Self, StageError> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            conn,
            labels,
            dedup_days,
        })
    }

    fn issues_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/issues",
            self.conn.api_base.trim_end_matches('/'),
            self.conn.owner,
            self.conn.repo
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.conn.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Issues (any state) updated in the last `days` days.
    #[instrument(level = "info", skip(self))]
    pub async fn recent_issues(&self, days: u32) -> Result<RecentIssues, StageError> {
        let since = (Utc::now() - Duration::days(i64::from(days))).to_rfc3339();
        let url = self.issues_url();
        let per_page = PER_PAGE.to_string();
        let mut recent = RecentIssues::default();
        let mut capped = false;

        for page in 1..=MAX_PAGES {
            let page_str = page.to_string();
            let resp = self
                .request(reqwest::Method::GET, &url)
                .query(&[
                    ("state", "all"),
                    ("since", since.as_str()),
                    ("per_page", per_page.as_str()),
                    ("page", page_str.as_str()),
                ])
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(StageError::msg(format!(
                    "GitHub API returned HTTP {} listing issues: {body}",
                    status.as_u16()
                )));
            }

            let issues: Vec<Issue> = resp.json().await?;
            let count = issues.len();
            for issue in issues {
                if let Some(body) = &issue.body {
                    recent.urls.extend(extract_urls(body));
                }
                recent.titles.insert(issue.title);
            }
            debug!(page, count, "Listed issues");
            if count < PER_PAGE {
                break;
            }
            capped = page == MAX_PAGES;
        }
        if capped {
            warn!(
                max_issues = PER_PAGE * MAX_PAGES,
                days,
                "Issue listing hit the page cap; older issues in the window are not checked for duplicates"
            );
        }

        info!(
            urls = recent.urls.len(),
            titles = recent.titles.len(),
            "Loaded recent issues"
        );
        Ok(recent)
    }

    async fn create_issue(&self, title: &str, body: &str, category: &str) -> Result<CreatedIssue, StageError> {
        let mut labels = self.labels.clone();
        if !category.is_empty() && !labels.iter().any(|l| l == category) {
            labels.push(category.to_string());
        }
        let resp = self
            .request(reqwest::Method::POST, &self.issues_url())
            .json(&NewIssue { title, body, labels })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StageError::msg(format!(
                "GitHub API returned HTTP {} creating issue: {body}",
                status.as_u16()
            )));
        }
        Ok(resp.json().await?)
    }
}

/// Every http(s) URL in `text`, with trailing punctuation removed.
pub fn extract_urls(text: &str) -> impl Iterator<Item = String> + '_ {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']).to_string())
}

/// Status decided before any API call, or `None` when the group should be
/// created.
fn precheck_group(group: &CategoryGroup, existing_titles: &HashSet<String>, dry_run: bool) -> Option<PublicationStatus> {
    if existing_titles.contains(&group.title) {
        Some(PublicationStatus::Duplicate)
    } else if dry_run {
        Some(PublicationStatus::Skipped)
    } else {
        None
    }
}

#[async_trait]
impl Publisher for GithubPublisher {
    async fn get_existing_urls(&self, days: u32) -> Result<HashSet<String>, StageError> {
        Ok(self.recent_issues(days).await?.urls)
    }

    #[instrument(level = "info", skip_all, fields(articles = articles.len(), dry_run = dry_run))]
    async fn publish_batch(
        &self,
        articles: &[SummarizedArticle],
        dry_run: bool,
    ) -> Result<Vec<PublishedArticle>, StageError> {
        let mut out = Vec::with_capacity(articles.len());
        for article in articles {
            if dry_run {
                info!(url = %article.url(), "Dry run; not creating issue");
                out.push(PublishedArticle::new(article.clone(), PublicationStatus::Skipped));
                continue;
            }
            let a = article.article();
            match self.create_issue(&a.title, &render_article(article), &a.category).await {
                Ok(issue) => {
                    info!(url = %a.url, number = issue.number, "Created issue");
                    out.push(PublishedArticle::created(article.clone(), issue.number, issue.html_url));
                }
                Err(e) => {
                    warn!(url = %a.url, error = %e, "Issue creation failed");
                    out.push(PublishedArticle::failed(article.clone(), e.to_string()));
                }
            }
        }
        Ok(out)
    }

    #[instrument(level = "info", skip_all, fields(groups = groups.len(), dry_run = dry_run))]
    async fn publish_category_batch(
        &self,
        groups: &[CategoryGroup],
        dry_run: bool,
    ) -> Result<Vec<CategoryPublishResult>, StageError> {
        let existing_titles = match self.recent_issues(self.dedup_days).await {
            Ok(recent) => recent.titles,
            Err(e) => {
                warn!(error = %e, "Could not list recent issues; skipping title duplicate check");
                HashSet::new()
            }
        };

        let mut out = Vec::with_capacity(groups.len());
        for group in groups {
            if let Some(status) = precheck_group(group, &existing_titles, dry_run) {
                info!(title = %group.title, ?status, "Not creating digest issue");
                out.push(CategoryPublishResult::for_group(group, status));
                continue;
            }
            let result = match self
                .create_issue(&group.title, &render_group(group), &group.category)
                .await
            {
                Ok(issue) => {
                    info!(title = %group.title, number = issue.number, "Created digest issue");
                    CategoryPublishResult {
                        issue_number: Some(issue.number),
                        issue_url: Some(issue.html_url),
                        ..CategoryPublishResult::for_group(group, PublicationStatus::Success)
                    }
                }
                Err(e) => {
                    warn!(title = %group.title, error = %e, "Digest issue creation failed");
                    CategoryPublishResult {
                        error_message: Some(e.to_string()),
                        ..CategoryPublishResult::for_group(group, PublicationStatus::Failed)
                    }
                }
            };
            out.push(result);
        }
        Ok(out)
    }
}
