//! RSS 2.0, RSS 1.0 (RDF) and Atom parsing into [`FeedItem`]s.
//!
//! The root element is sniffed with the streaming reader, then the document
//! is deserialized with `quick_xml::de` into format-specific shapes.
//!
//! The deserializer keys elements by local name, so `atom:link` and `link`
//! would collide. Before deserializing, foreign-prefixed element names are
//! rewritten to `prefix_local` (`atom_link`, `dc_creator`) and the root
//! element's own prefix is dropped. Every child is modelled as a list so
//! repeated elements never fail the whole feed.

use super::FeedItem;
use crate::error::FeedError;
use crate::utils::collapse_whitespace;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use scraper::Html;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

#[derive(Debug, Default, Deserialize)]
struct Node {
    #[serde(rename = "$text", default)]
    text: String,
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: String,
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Default, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RdfDocument {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Vec<Node>,
    #[serde(default)]
    link: Vec<Node>,
    #[serde(rename = "atom_link", default)]
    atom_link: Vec<Node>,
    #[serde(default)]
    guid: Vec<Node>,
    #[serde(rename = "pubDate", default)]
    pub_date: Vec<Node>,
    #[serde(rename = "dc_date", alias = "date", default)]
    dc_date: Vec<Node>,
    #[serde(default)]
    description: Vec<Node>,
    #[serde(rename = "content_encoded", alias = "encoded", default)]
    encoded: Vec<Node>,
    #[serde(default)]
    author: Vec<Node>,
    #[serde(rename = "dc_creator", alias = "creator", default)]
    creator: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    id: Vec<Node>,
    #[serde(default)]
    title: Vec<Node>,
    #[serde(default)]
    link: Vec<AtomLink>,
    #[serde(default)]
    published: Vec<Node>,
    #[serde(default)]
    updated: Vec<Node>,
    #[serde(default)]
    summary: Vec<Node>,
    #[serde(default)]
    content: Vec<Node>,
    #[serde(default)]
    author: Vec<AtomPerson>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomPerson {
    #[serde(default)]
    name: Vec<Node>,
}

/// Item fields common to every format, before identity is assigned.
struct RawEntry {
    guid: Option<String>,
    title: String,
    link: String,
    published_raw: Option<String>,
    summary: String,
    content: String,
    author: Option<String>,
}

/// Parse raw feed bytes into items in document order.
#[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
pub fn parse_feed(bytes: &[u8], fetched_at: DateTime<Utc>) -> Result<Vec<FeedItem>, FeedError> {
    let text = String::from_utf8_lossy(bytes);
    let xml = text.trim_start_matches('\u{feff}');

    let root = root_element(xml)?;
    let flat = flatten_prefixes(xml)?;
    let xml = flat.as_str();

    let entries = match root.as_str() {
        "rss" => from_xml::<RssDocument>(xml)?
            .channel
            .items
            .into_iter()
            .map(RawEntry::from)
            .collect::<Vec<_>>(),
        "RDF" => from_xml::<RdfDocument>(xml)?
            .items
            .into_iter()
            .map(RawEntry::from)
            .collect(),
        "feed" => from_xml::<AtomFeed>(xml)?
            .entries
            .into_iter()
            .map(RawEntry::from)
            .collect(),
        other => {
            return Err(FeedError::Parse(format!(
                "unsupported feed root element <{other}>"
            )));
        }
    };

    let items: Vec<FeedItem> = entries
        .into_iter()
        .filter_map(|entry| entry.into_item(fetched_at))
        .collect();
    debug!(count = items.len(), "Parsed feed items");
    Ok(items)
}

fn from_xml<T: for<'de> Deserialize<'de>>(xml: &str) -> Result<T, FeedError> {
    quick_xml::de::from_str(xml).map_err(|e| FeedError::Parse(e.to_string()))
}

fn root_element(xml: &str) -> Result<String, FeedError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(FeedError::Parse("document has no root element".to_string()));
            }
            Err(e) => return Err(FeedError::Parse(format!("XML parse error: {e}"))),
            _ => {}
        }
    }
}

/// Rewrite prefixed element names so the deserializer can tell namespaces
/// apart. Text, CDATA and attributes are copied through untouched.
fn flatten_prefixes(xml: &str) -> Result<String, FeedError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut root_prefix: Option<Option<Vec<u8>>> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| FeedError::Parse(format!("XML parse error: {e}")))?;
        let event = match event {
            Event::Eof => break,
            Event::Start(mut e) => {
                let root = root_prefix.get_or_insert_with(|| prefix_of(e.name()));
                if let Some(flat) = flattened_name(e.name(), root.as_deref()) {
                    e.set_name(&flat);
                }
                Event::Start(e)
            }
            Event::Empty(mut e) => {
                let root = root_prefix.get_or_insert_with(|| prefix_of(e.name()));
                if let Some(flat) = flattened_name(e.name(), root.as_deref()) {
                    e.set_name(&flat);
                }
                Event::Empty(e)
            }
            Event::End(e) => {
                let root = root_prefix.as_ref().and_then(|p| p.as_deref());
                match flattened_name(e.name(), root) {
                    Some(flat) => Event::End(BytesEnd::new(String::from_utf8_lossy(&flat).into_owned())),
                    None => Event::End(e),
                }
            }
            other => other,
        };
        writer
            .write_event(event)
            .map_err(|e| FeedError::Parse(format!("XML rewrite error: {e}")))?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| FeedError::Parse(e.to_string()))
}

fn prefix_of(name: QName<'_>) -> Option<Vec<u8>> {
    name.prefix().map(|p| p.as_ref().to_vec())
}

/// `None` when the name has no prefix and stays as is.
fn flattened_name(name: QName<'_>, root_prefix: Option<&[u8]>) -> Option<Vec<u8>> {
    let (local, prefix) = name.decompose();
    let prefix = prefix?;
    if Some(prefix.as_ref()) == root_prefix {
        return Some(local.as_ref().to_vec());
    }
    let mut flat = prefix.as_ref().to_vec();
    flat.push(b'_');
    flat.extend_from_slice(local.as_ref());
    Some(flat)
}

fn first_text(nodes: &[Node]) -> Option<String> {
    nodes
        .iter()
        .map(|n| n.text.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn strip_markup(fragment: &str) -> String {
    if !fragment.contains('<') {
        return collapse_whitespace(fragment);
    }
    let doc = Html::parse_fragment(fragment);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl From<RssItem> for RawEntry {
    fn from(item: RssItem) -> Self {
        // RSS `link` carries text; an `atom:link` sibling carries `href`,
        // and its `rel="self"` form points at the feed, not the article.
        let link = first_text(&item.link)
            .or_else(|| {
                item.link
                    .iter()
                    .chain(item.atom_link.iter().filter(|n| matches!(n.rel.as_str(), "" | "alternate")))
                    .map(|n| n.href.trim())
                    .find(|h| !h.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        Self {
            guid: first_text(&item.guid),
            title: first_text(&item.title).unwrap_or_default(),
            link,
            published_raw: first_text(&item.pub_date).or_else(|| first_text(&item.dc_date)),
            summary: first_text(&item.description).unwrap_or_default(),
            content: first_text(&item.encoded).unwrap_or_default(),
            author: first_text(&item.author).or_else(|| first_text(&item.creator)),
        }
    }
}

impl From<AtomEntry> for RawEntry {
    fn from(entry: AtomEntry) -> Self {
        let link = entry
            .link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| entry.link.first())
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default();
        Self {
            guid: first_text(&entry.id),
            title: first_text(&entry.title).unwrap_or_default(),
            link,
            published_raw: first_text(&entry.published).or_else(|| first_text(&entry.updated)),
            summary: first_text(&entry.summary).unwrap_or_default(),
            content: first_text(&entry.content).unwrap_or_default(),
            author: entry.author.iter().find_map(|p| first_text(&p.name)),
        }
    }
}

impl RawEntry {
    fn into_item(self, fetched_at: DateTime<Utc>) -> Option<FeedItem> {
        let title = strip_markup(&self.title);
        if title.is_empty() && self.link.is_empty() {
            debug!("Skipping entry with neither title nor link");
            return None;
        }

        let item_id = match (&self.guid, self.link.is_empty()) {
            (Some(guid), _) => guid.clone(),
            (None, false) => self.link.clone(),
            (None, true) => {
                let mut hasher = Sha256::new();
                hasher.update(title.as_bytes());
                hasher.update(b"|");
                hasher.update(self.published_raw.as_deref().unwrap_or("").as_bytes());
                format!("sha256:{:x}", hasher.finalize())
            }
        };

        Some(FeedItem {
            item_id,
            title,
            link: self.link,
            published: self.published_raw.as_deref().and_then(parse_date),
            summary: strip_markup(&self.summary),
            content: strip_markup(&self.content),
            author: self.author,
            fetched_at,
        })
    }
}
