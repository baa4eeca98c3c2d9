//! Article text extraction from HTML.
//!
//! Tries a fixed list of content containers in priority order and takes the
//! first one that yields text; falls back to `<body>`. Text inside
//! `script`, `style` and `noscript` is never included.

use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "[itemprop=\"articleBody\"]",
    ".article-body",
    ".article-content",
    ".article__body",
    ".story-body",
    ".post-content",
    ".entry-content",
    ".content-body",
    "#article-body",
    "#content",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

static CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("valid content selector"))
        .collect()
});

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid body selector"));

/// Visible text of one element, skipping script-like descendants.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}

fn joined_text<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> String {
    elements
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract the readable article text from an HTML document.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTAINERS.iter() {
        let text = joined_text(document.select(selector));
        if !text.is_empty() {
            return text;
        }
    }

    joined_text(document.select(&BODY))
}
