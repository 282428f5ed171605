//! Source adapters: the per-site plugins the generic engine drives.
//!
//! An adapter is a pure transformation layer: it recognizes detail URLs,
//! maps 1-indexed page numbers to requests, and extracts structured data from
//! fetched bodies. It never performs I/O itself; fetching goes through the
//! [`PageFetcher`] capability the engine supplies.

pub mod ge;
pub mod jobroom;
pub mod jobup;
pub mod talent;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::Html;
use serde_json::Value;
use thiserror::Error;

use crate::domain::record::{JobRecord, ListingPage};
use crate::infrastructure::config::SearchConfig;

/// Structurally broken input, as distinct from "nothing found", which adapters
/// report as empty output. The engine treats this loudly (§ error policy).
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("malformed JSON payload: {reason}")]
    Json { reason: String },
    #[error("malformed feed payload: {reason}")]
    Feed { reason: String },
    #[error("detail pages are not fetched for source '{source_id}'")]
    DetailUnsupported { source_id: &'static str },
}

/// Errors surfaced by the HTTP fetch capability.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network failure fetching {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("blocked or throttled (HTTP {status}) at {url}")]
    Blocked { url: String, status: u16 },
    #[error("HTTP {status} at {url}")]
    Status { url: String, status: u16 },
}

/// A single page request an adapter asks the engine to perform. Most sources
/// are plain GETs; JSON search APIs describe a POST body.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub url: String,
    pub method: RequestMethod,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub enum RequestMethod {
    Get,
    PostJson(Value),
}

impl PageRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: RequestMethod::Get,
            headers: Vec::new(),
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            method: RequestMethod::PostJson(body),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successfully fetched page body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// HTTP fetch capability handed to the engine; implemented by the real
/// client in `infrastructure` and by in-memory fakes in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, FetchError>;
    async fn fetch_bytes(&self, request: &PageRequest) -> Result<Vec<u8>, FetchError>;
}

/// One entry of a companion feed (RSS or similar), keyed by detail URL.
#[derive(Debug, Clone, Default)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub posting_date: Option<NaiveDate>,
}

/// Capability set every source implements. All methods are pure.
pub trait SourceAdapter: Send + Sync {
    /// Fixed tag stored in every record of this source.
    fn source_id(&self) -> &'static str;

    /// True iff `url` is a genuine detail page of this source.
    fn recognize(&self, url: &str) -> bool;

    /// Page-1 request built from the configured search.
    fn search_request(&self, search: &SearchConfig) -> PageRequest;

    /// Request for a 1-indexed page number. Adapters that are 0-indexed at
    /// the wire level translate internally.
    fn page_request(&self, search: &SearchConfig, page: u32) -> PageRequest;

    /// Extract listing summaries and pagination hints from a result page.
    /// Missing fields degrade to `None`; an empty page is `Ok` with no
    /// summaries.
    fn extract_listing_page(&self, body: &str) -> Result<ListingPage, ParseError>;

    /// Extract a normalized record from a detail page body.
    fn extract_detail(&self, body: &str, url: &str) -> Result<JobRecord, ParseError>;

    /// How to fetch the detail page for `url`; `None` means the listing data
    /// is authoritative and detail pages are never fetched.
    fn detail_request(&self, url: &str) -> Option<PageRequest> {
        Some(PageRequest::get(url))
    }

    /// Result-page size, for sources whose API reports a total count.
    fn page_size(&self) -> Option<u32> {
        None
    }

    /// Optional companion feed request (e.g. an RSS feed of the same
    /// listings).
    fn feed_request(&self) -> Option<PageRequest> {
        None
    }

    /// Parse the companion feed into a URL-keyed fallback map.
    fn parse_feed(&self, _body: &[u8]) -> Result<HashMap<String, FeedEntry>, ParseError> {
        Ok(HashMap::new())
    }
}

/// Look up an adapter by its source tag. Adapters that carry per-run state
/// (like jobroom's preferred description language) read it from the search
/// configuration once, at construction time.
pub fn by_name(name: &str, search: &SearchConfig) -> Option<Box<dyn SourceAdapter>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "jobup" => Some(Box::new(jobup::JobupAdapter::new())),
        "talent" => Some(Box::new(talent::TalentAdapter::new())),
        "ge" => Some(Box::new(ge::GeAdapter::new())),
        "jobroom" => Some(Box::new(jobroom::JobroomAdapter::from_search(search))),
        _ => None,
    }
}

// ---- shared extraction helpers ----

/// Collapse whitespace, drop empties, cap length at a character boundary.
pub(crate) fn clean_text(raw: &str, limit: usize) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(limit).collect())
}

/// Clean a fragment that may contain markup or entities: parse as HTML,
/// take the text content, then collapse.
pub(crate) fn clean_html_text(raw: &str, limit: usize) -> Option<String> {
    let fragment = Html::parse_fragment(raw);
    let text = fragment.root_element().text().collect::<String>();
    clean_text(&text, limit)
}

/// Date parsing tried in fixed priority order; a trailing timestamp part is
/// cut before matching. Returns `None` on total failure.
pub(crate) fn parse_date_any(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    for format in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }
    None
}

/// Resolve `href` against `base`, dropping the fragment. Unparseable links
/// yield `None` rather than an error.
pub(crate) fn canonicalize_link(base: &str, href: &str) -> Option<String> {
    let base_url = url::Url::parse(base).ok()?;
    let mut resolved = base_url.join(href.trim()).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// Collect every JSON object reachable from the `<script
/// type="application/ld+json">` blocks of a page.
pub(crate) fn ld_json_objects(html: &Html) -> Vec<Value> {
    let selector = scraper::Selector::parse(r#"script[type="application/ld+json"]"#)
        .expect("ld+json selector");
    let mut objects = Vec::new();
    for script in html.select(&selector) {
        let raw = script.text().collect::<String>();
        if raw.trim().is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(&raw) {
            collect_objects(&value, &mut objects);
        }
    }
    objects
}

fn collect_objects(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Object(map) => {
            out.push(value.clone());
            for child in map.values() {
                collect_objects(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_objects(item, out);
            }
        }
        _ => {}
    }
}

/// First node whose `@type` is `JobPosting` (case-insensitive).
pub(crate) fn find_job_posting(objects: &[Value]) -> Option<&Value> {
    objects.iter().find(|node| {
        node.get("@type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case("jobposting"))
    })
}
