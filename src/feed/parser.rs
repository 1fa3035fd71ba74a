// src/feed/parser.rs
//! Syndication document parsing: Atom (arXiv API) first, RSS 2.0 as fallback.
//! Produces normalized `PaperRecord`s in document order.

use chrono::DateTime;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use super::types::{FeedError, PaperRecord};

/// Element text; attributes such as `type="html"` are ignored.
#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<TextNode>,
    published: Option<TextNode>,
    updated: Option<TextNode>,
    title: Option<TextNode>,
    summary: Option<TextNode>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term", default)]
    term: String,
}

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    guid: Option<TextNode>,
    title: Option<TextNode>,
    description: Option<TextNode>,
    link: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<TextNode>,
    author: Option<TextNode>,
    #[serde(rename = "creator", alias = "dc:creator", default)]
    creators: Vec<TextNode>,
    #[serde(rename = "category", default)]
    categories: Vec<TextNode>,
}

/// Parse a raw feed document into normalized records.
///
/// An empty `Vec` means the document was well formed but had no entries;
/// deciding whether that is a failure is up to the caller.
pub fn parse_feed(raw: &str) -> Result<Vec<PaperRecord>, FeedError> {
    let xml = scrub_html_entities_for_xml(raw);
    match root_element_name(&xml)?.as_str() {
        "rss" => parse_rss(&xml),
        _ => parse_atom(&xml),
    }
}

/// Collapse embedded newlines into single spaces and trim the ends.
pub fn collapse_newlines(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\n', '\r'], " ").trim().to_string()
}

/// First 10 characters of a timestamp (the calendar date of an ISO-8601 value).
pub fn date_prefix(ts: &str) -> String {
    ts.trim().chars().take(10).collect()
}

fn parse_atom(xml: &str) -> Result<Vec<PaperRecord>, FeedError> {
    let feed: AtomFeed = from_str(xml).map_err(|e| FeedError::Malformed(e.to_string()))?;
    Ok(feed.entries.into_iter().map(record_from_atom).collect())
}

fn record_from_atom(entry: AtomEntry) -> PaperRecord {
    let id = text_of(entry.id);
    let published = entry
        .published
        .or(entry.updated)
        .map(|t| t.value)
        .unwrap_or_default();
    let link = primary_link(&entry.links).unwrap_or_else(|| id.trim().to_string());

    PaperRecord {
        published_date: date_prefix(&published),
        title: collapse_newlines(&text_of(entry.title)),
        summary: collapse_newlines(&text_of(entry.summary)),
        link,
        authors: entry
            .authors
            .into_iter()
            .filter_map(|a| a.name)
            .map(|n| collapse_newlines(&n.value))
            .filter(|n| !n.is_empty())
            .collect(),
        categories: entry
            .categories
            .into_iter()
            .map(|c| c.term.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        id: id.trim().to_string(),
    }
}

/// `rel="alternate"` wins (a missing rel means alternate), else the first link.
fn primary_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .filter(|l| !l.href.trim().is_empty())
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.iter().find(|l| !l.href.trim().is_empty()))
        .map(|l| l.href.trim().to_string())
}

fn parse_rss(xml: &str) -> Result<Vec<PaperRecord>, FeedError> {
    let rss: Rss = from_str(xml).map_err(|e| FeedError::Malformed(e.to_string()))?;
    Ok(rss.channel.items.into_iter().map(record_from_rss).collect())
}

fn record_from_rss(item: RssItem) -> PaperRecord {
    let link = text_of(item.link).trim().to_string();
    let guid = text_of(item.guid).trim().to_string();
    let published_date = item
        .pub_date
        .map(|t| rss_date(&t.value))
        .unwrap_or_default();

    let mut authors: Vec<String> = item
        .creators
        .into_iter()
        .map(|c| collapse_newlines(&c.value))
        .filter(|c| !c.is_empty())
        .collect();
    if authors.is_empty() {
        if let Some(a) = item.author {
            let a = collapse_newlines(&a.value);
            if !a.is_empty() {
                authors.push(a);
            }
        }
    }

    PaperRecord {
        published_date,
        title: collapse_newlines(&text_of(item.title)),
        summary: collapse_newlines(&text_of(item.description)),
        link: if link.is_empty() { guid.clone() } else { link },
        authors,
        categories: item
            .categories
            .into_iter()
            .map(|c| c.value.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        id: guid,
    }
}

/// RFC 2822 `pubDate` → `YYYY-MM-DD`; unparseable values keep their raw prefix.
fn rss_date(raw: &str) -> String {
    DateTime::parse_from_rfc2822(raw.trim())
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| date_prefix(raw))
}

fn text_of(node: Option<TextNode>) -> String {
    node.map(|t| t.value).unwrap_or_default()
}

fn root_element_name(xml: &str) -> Result<String, FeedError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let local = e.local_name();
                return Ok(String::from_utf8_lossy(local.as_ref()).to_ascii_lowercase());
            }
            Ok(Event::Eof) => {
                return Err(FeedError::Malformed("document has no root element".into()))
            }
            Ok(_) => continue,
            Err(e) => return Err(FeedError::Malformed(e.to_string())),
        }
    }
}

/// HTML entities that are not valid XML but show up in hand-rolled feeds.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
