//! Markdown rendering of category digests.
//!
//! The same rendering feeds two consumers: [`MarkdownExporter`] writes it to
//! `{export_dir}/{date}/{category-slug}.md`, and the GitHub publisher uses it
//! as the issue body. Every article link is written out in full so the URLs
//! can be recovered from the body later.

use crate::error::StageError;
use crate::pipeline::{CategoryGroup, Exporter, SummarizedArticle};
use crate::utils::slugify_title;
use async_trait::async_trait;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Body for a single-article publication.
pub fn render_article(article: &SummarizedArticle) -> String {
    let a = article.article();
    let mut md = String::new();
    let _ = writeln!(md, "**Source:** {}  ", a.source);
    if let Some(published) = a.published_at {
        let _ = writeln!(md, "**Published:** {}  ", published.format("%Y-%m-%d %H:%M UTC"));
    }
    let _ = writeln!(md, "**Category:** {}  ", a.category);
    let _ = writeln!(md, "**URL:** {}\n", a.url);
    let _ = writeln!(md, "{}", article.summary);
    md
}

/// Full digest for one (category, date) group.
pub fn render_group(group: &CategoryGroup) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {}\n", group.title);
    let _ = writeln!(
        md,
        "_{} · {} · {} article(s)_\n",
        group.category_label,
        group.date,
        group.articles.len()
    );

    for (i, article) in group.articles.iter().enumerate() {
        let a = article.article();
        let _ = writeln!(md, "## {}. {}\n", i + 1, a.title);
        let _ = writeln!(md, "- Source: {}", a.source);
        let _ = writeln!(md, "- URL: {}\n", a.url);
        let _ = writeln!(md, "{}\n", article.summary);
    }
    md
}

/// File name (without directory) for a category's digest.
pub fn category_file_name(category: &str) -> String {
    let slug = slugify_title(category);
    if slug.is_empty() {
        "uncategorized.md".to_string()
    } else {
        format!("{slug}.md")
    }
}

/// Writes each group as Markdown under a per-date directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownExporter;

#[async_trait]
impl Exporter for MarkdownExporter {
    #[instrument(level = "info", skip_all, fields(title = %group.title, export_dir = %export_dir.display()))]
    async fn export(&self, group: &CategoryGroup, export_dir: &Path) -> Result<PathBuf, StageError> {
        let dir = export_dir.join(group.date.to_string());
        fs::create_dir_all(&dir).await?;

        let path = dir.join(category_file_name(&group.category));
        fs::write(&path, render_group(group)).await?;
        info!(path = %path.display(), articles = group.articles.len(), "Wrote Markdown digest");
        Ok(path)
    }
}
