//! Feed sources and scraped payload reading.
//!
//! A [`FeedSource`] produces a finite batch of [`Entry`] values per call and
//! keeps no cursor between calls; deduplication happens downstream.
//!
//! [`RssFeed`] reads RSS 2.0 (`<item><title/><link/></item>`) and Atom
//! (`<entry><title/><link href=""/></entry>`) documents over HTTP(S) or from
//! a local file. Scraped payloads are JSON objects keyed by entry id:
//!
//! ```json
//! { "17": { "Type": "UPSC Key", "Title": "Budget basics", "Link": "https://..." } }
//! ```
//!
//! `Type` is optional; entries without it are classified by title.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;

use crate::config::FeedConfig;
use crate::error::{PipelineError, Result};
use crate::models::Entry;

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable origin used in logs and errors.
    fn origin(&self) -> String;

    async fn fetch(&self) -> Result<Vec<Entry>>;
}

/// Where a feed document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    Http(String),
    File(PathBuf),
}

impl FeedLocation {
    /// `http(s)://` is fetched, `file://` and bare paths are read from disk.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            FeedLocation::Http(raw.to_string())
        } else {
            let path = raw.strip_prefix("file://").unwrap_or(raw);
            FeedLocation::File(PathBuf::from(path))
        }
    }
}

pub struct RssFeed {
    location: FeedLocation,
    timeout: Duration,
}

impl RssFeed {
    pub fn new(location: FeedLocation, timeout: Duration) -> Self {
        Self { location, timeout }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            FeedLocation::parse(&config.url),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn read_body(&self) -> Result<String> {
        let origin = self.origin();
        match &self.location {
            FeedLocation::Http(url) => {
                let client = reqwest::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(|e| PipelineError::input_not_found(origin.clone(), e))?;
                let response = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| PipelineError::input_not_found(origin.clone(), e))?;
                response
                    .text()
                    .await
                    .map_err(|e| PipelineError::input_not_found(origin, e))
            }
            FeedLocation::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| PipelineError::input_not_found(origin, e)),
        }
    }
}

#[async_trait]
impl FeedSource for RssFeed {
    fn origin(&self) -> String {
        match &self.location {
            FeedLocation::Http(url) => url.clone(),
            FeedLocation::File(path) => path.display().to_string(),
        }
    }

    async fn fetch(&self) -> Result<Vec<Entry>> {
        let body = self.read_body().await?;
        let entries = parse_feed(&self.origin(), &body)?;
        tracing::debug!(origin = %self.origin(), entries = entries.len(), "feed fetched");
        Ok(entries)
    }
}

/// A fixed batch of entries, handed out on every fetch.
pub struct StaticFeed {
    entries: Vec<Entry>,
}

impl StaticFeed {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn origin(&self) -> String {
        "static".to_string()
    }

    async fn fetch(&self) -> Result<Vec<Entry>> {
        Ok(self.entries.clone())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
}

fn href_of(e: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel_ok = true;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => href = attr.unescape_value().ok().map(|v| v.into_owned()),
            b"rel" => {
                rel_ok = attr
                    .unescape_value()
                    .map(|v| v == "alternate")
                    .unwrap_or(false)
            }
            _ => {}
        }
    }
    if rel_ok {
        href
    } else {
        None
    }
}

/// Parses an RSS or Atom document into entries keyed by 1-based position.
pub fn parse_feed(origin: &str, xml: &str) -> Result<Vec<Entry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut in_item = false;
    let mut field: Option<Field> = None;
    let mut title = String::new();
    let mut link = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    in_item = true;
                    title.clear();
                    link.clear();
                }
                b"title" if in_item => field = Some(Field::Title),
                b"link" if in_item => {
                    if let Some(href) = href_of(&e) {
                        if link.is_empty() {
                            link = href;
                        }
                    }
                    field = Some(Field::Link);
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_item && e.local_name().as_ref() == b"link" && link.is_empty() {
                    if let Some(href) = href_of(&e) {
                        link = href;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(f) = field {
                    let text = t
                        .unescape()
                        .map_err(|e| PipelineError::malformed(origin, e))?;
                    match f {
                        Field::Title => title.push_str(&text),
                        Field::Link if link.is_empty() => link.push_str(&text),
                        Field::Link => {}
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(f) = field {
                    let text = String::from_utf8_lossy(&c);
                    match f {
                        Field::Title => title.push_str(&text),
                        Field::Link if link.is_empty() => link.push_str(&text),
                        Field::Link => {}
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"title" | b"link" => field = None,
                b"item" | b"entry" if in_item => {
                    in_item = false;
                    field = None;
                    if !title.trim().is_empty() || !link.trim().is_empty() {
                        let key = (entries.len() + 1).to_string();
                        entries.push(Entry::new(key, title.trim(), link.trim()));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(PipelineError::malformed(origin, e)),
            _ => {}
        }
    }

    Ok(entries)
}

/// Reads a scraped payload from disk.
pub fn read_scraped(path: &Path) -> Result<Vec<Entry>> {
    let origin = path.display().to_string();
    let content = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::input_not_found(origin.clone(), e))?;
    parse_scraped(&origin, &content)
}

/// Parses a scraped payload, keeping the file's entry order.
pub fn parse_scraped(origin: &str, content: &str) -> Result<Vec<Entry>> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| PipelineError::malformed(origin, e))?;
    let Value::Object(map) = value else {
        return Err(PipelineError::malformed(
            origin,
            "expected a JSON object keyed by entry id",
        ));
    };

    let mut entries = Vec::with_capacity(map.len());
    for (key, item) in map {
        let Some(obj) = item.as_object() else {
            return Err(PipelineError::malformed(
                origin,
                format!("entry {} is not an object", key),
            ));
        };
        let text = |primary: &str, fallback: &str| {
            obj.get(primary)
                .or_else(|| obj.get(fallback))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let title = text("Title", "Name")
            .ok_or_else(|| PipelineError::malformed(origin, format!("entry {} has no Title", key)))?;
        let link = text("Link", "URL")
            .ok_or_else(|| PipelineError::malformed(origin, format!("entry {} has no Link", key)))?;

        let mut entry = Entry::new(key.as_str(), title, link);
        if let Some(kind) = obj.get("Type").and_then(Value::as_str) {
            entry = entry.with_category(kind);
        }
        entries.push(entry);
    }
    Ok(entries)
}
