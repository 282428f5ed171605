//! jobup.ch source adapter, the reference HTML adapter.
//!
//! Search pages are scanned for detail links; detail pages carry a JSON-LD
//! `JobPosting` block, with OpenGraph meta tags as fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::domain::record::{JobRecord, ListingPage, ListingSummary};
use crate::infrastructure::config::SearchConfig;

use super::{
    canonicalize_link, clean_html_text, find_job_posting, ld_json_objects, parse_date_any,
    PageRequest, ParseError, SourceAdapter,
};

const BASE_URL: &str = "https://www.jobup.ch/fr/emplois/";
const DETAIL_ORIGIN: &str = "https://www.jobup.ch";

static TOTAL_PAGES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:totalPages|total_pages)"\s*:\s*(\d+)"#).expect("total pages regex"));

pub struct JobupAdapter;

impl JobupAdapter {
    pub fn new() -> Self {
        Self
    }

    fn base_search_url(&self, search: &SearchConfig) -> String {
        if let Some(url) = search.url.as_deref() {
            let trimmed = url.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
        let mut url = Url::parse(BASE_URL).expect("base url");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("location", &search.location);
            if !search.term.trim().is_empty() {
                pairs.append_pair("term", search.term.trim());
            }
        }
        url.to_string()
    }
}

impl Default for JobupAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for JobupAdapter {
    fn source_id(&self) -> &'static str {
        "jobup"
    }

    fn recognize(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let host_ok = parsed
            .host_str()
            .is_some_and(|h| h.to_ascii_lowercase().ends_with("jobup.ch"));
        host_ok && parsed.path().contains("/emplois/detail/")
    }

    fn search_request(&self, search: &SearchConfig) -> PageRequest {
        PageRequest::get(self.base_search_url(search))
    }

    fn page_request(&self, search: &SearchConfig, page: u32) -> PageRequest {
        PageRequest::get(set_page_param(&self.base_search_url(search), "page", page))
    }

    fn extract_listing_page(&self, body: &str) -> Result<ListingPage, ParseError> {
        let html = Html::parse_document(body);
        let anchor = Selector::parse("a[href]").expect("anchor selector");

        let mut summaries = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for element in html.select(&anchor) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(full) = canonicalize_link(DETAIL_ORIGIN, href) else {
                continue;
            };
            if !self.recognize(&full) || !seen.insert(full.clone()) {
                continue;
            }
            summaries.push(ListingSummary::new(full));
        }

        let total_pages = TOTAL_PAGES_RE
            .captures(body)
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .map(|n| n.max(1));

        Ok(ListingPage {
            summaries,
            total_pages,
            total_count: None,
        })
    }

    fn extract_detail(&self, body: &str, url: &str) -> Result<JobRecord, ParseError> {
        let html = Html::parse_document(body);
        let mut record = JobRecord::new(self.source_id(), url);

        let objects = ld_json_objects(&html);
        if let Some(posting) = find_job_posting(&objects) {
            record.title = posting
                .get("title")
                .and_then(Value::as_str)
                .and_then(|t| clean_html_text(t, 180));
            record.company = posting
                .get("hiringOrganization")
                .and_then(|org| org.get("name"))
                .and_then(Value::as_str)
                .and_then(|c| clean_html_text(c, 140));
            record.location = posting
                .get("jobLocation")
                .and_then(|loc| loc.get("address"))
                .and_then(|addr| {
                    addr.get("addressLocality")
                        .or_else(|| addr.get("addressRegion"))
                })
                .and_then(Value::as_str)
                .and_then(|l| clean_html_text(l, 120));
            record.description = posting
                .get("description")
                .and_then(Value::as_str)
                .and_then(|d| clean_html_text(d, 1200));
            record.posting_date = posting
                .get("datePosted")
                .and_then(Value::as_str)
                .and_then(parse_date_any);
        }

        if record.title.is_none() {
            record.title = meta_content(&html, "og:title").and_then(|t| clean_html_text(&t, 180));
        }
        if record.description.is_none() {
            record.description =
                meta_content(&html, "og:description").and_then(|d| clean_html_text(&d, 1200));
        }

        Ok(record)
    }
}

/// Replace the page query parameter on `base`, omitting it for page 1.
pub(crate) fn set_page_param(base: &str, param: &str, page: u32) -> String {
    let Ok(mut url) = Url::parse(base) else {
        return base.to_string();
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != param)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in &kept {
            pairs.append_pair(name, value);
        }
        if page > 1 {
            pairs.append_pair(param, &page.to_string());
        }
    }
    if url.query().is_some_and(str::is_empty) {
        url.set_query(None);
    }
    url.to_string()
}

fn meta_content(html: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[property="{property}"]"#)).ok()?;
    html.select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::to_string)
}
