//! Feed fetching and RSS/Atom parsing shared by the feed-based collectors.
//!
//! Both RSS 2.0 (`rss/channel/item`) and Atom (`feed/entry`) documents are
//! reduced to one [`FeedEntry`] shape. Atom entries without a `summary`
//! use their `content` instead.

use crate::models::Provider;
use html_escape::{decode_html_entities, encode_text};
use once_cell::sync::Lazy;
use quick_xml::de::{from_str, DeError};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Captures, Regex};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

/// Entities XML defines itself; left for the XML parser.
const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("feed XML is malformed: {0}")]
    Parse(#[from] DeError),
    #[error("unrecognised feed root element {0:?}")]
    UnknownFormat(Option<String>),
}

/// One feed entry, independent of the feed dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// RSS `pubDate` or Atom `published`.
    pub published: Option<String>,
    /// Atom `updated`.
    pub updated: Option<String>,
    /// HTML body: RSS `description`, Atom `summary` or `content`.
    pub summary: Option<String>,
}

/// Source of raw feed documents.
pub trait FeedSource {
    async fn fetch(&self, url: &str) -> Result<String, FeedError>;
}

/// Fetches feeds over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl FeedSource for HttpFeedSource {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FeedError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }
        Ok(response.text().await?)
    }
}

/// Fetch and parse a feed, logging and returning no entries on failure.
#[instrument(level = "info", skip_all, fields(%provider, %url))]
pub async fn load_entries<F: FeedSource>(
    source: &F,
    url: &str,
    provider: Provider,
) -> Vec<FeedEntry> {
    let parsed = match source.fetch(url).await {
        Ok(body) => parse_feed(&body),
        Err(e) => Err(e),
    };
    match parsed {
        Ok(entries) => {
            info!(count = entries.len(), %url, "Loaded feed entries");
            entries
        }
        Err(e) => {
            error!(error = %e, %url, "Feed unavailable; collecting nothing from it");
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl From<RssItem> for FeedEntry {
    fn from(item: RssItem) -> Self {
        Self {
            title: item.title,
            link: item.link,
            published: item.pub_date,
            updated: None,
            summary: item.description,
        }
    }
}

impl From<AtomEntry> for FeedEntry {
    fn from(entry: AtomEntry) -> Self {
        let link = entry
            .links
            .into_iter()
            .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
            .and_then(|l| l.href);
        let text = |t: Option<AtomText>| t.map(|t| t.value).filter(|v| !v.trim().is_empty());
        let summary = text(entry.summary).or_else(|| text(entry.content));
        Self {
            title: text(entry.title),
            link,
            published: entry.published,
            updated: entry.updated,
            summary,
        }
    }
}

/// Parse an RSS 2.0 or Atom document.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, FeedError> {
    let xml = resolve_html_entities(&scrub_html_entities_for_xml(xml));
    match root_element(&xml).as_deref() {
        Some("rss") => {
            let rss: Rss = from_str(&xml)?;
            Ok(rss.channel.items.into_iter().map(FeedEntry::from).collect())
        }
        Some("feed") => {
            let feed: AtomFeed = from_str(&xml)?;
            Ok(feed.entries.into_iter().map(FeedEntry::from).collect())
        }
        other => Err(FeedError::UnknownFormat(other.map(str::to_string))),
    }
}

fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Replace HTML-only entities that XML parsers reject.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Replace every remaining HTML named entity with its XML-safe text.
///
/// Unknown names are kept as literal text (`&name;` becomes `&amp;name;`)
/// so one stray entity cannot fail the whole document.
fn resolve_html_entities(s: &str) -> String {
    NAMED_ENTITY
        .replace_all(s, |caps: &Captures<'_>| {
            let whole = &caps[0];
            if XML_ENTITIES.contains(&&caps[1]) {
                return whole.to_string();
            }
            let decoded = decode_html_entities(whole);
            if decoded == whole {
                format!("&amp;{}", &whole[1..])
            } else {
                encode_text(&decoded).into_owned()
            }
        })
        .into_owned()
}
