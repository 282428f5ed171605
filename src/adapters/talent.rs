//! ch.talent.com source adapter.
//!
//! Same family as jobup: HTML search pages, JSON-LD detail pages. The search
//! markup only ever links one page ahead, so no reliable total-pages hint
//! exists; the controller runs in dynamic mode and the hint is derived from
//! pagination links when present.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::domain::record::{JobRecord, ListingPage, ListingSummary};
use crate::infrastructure::config::SearchConfig;

use super::jobup::set_page_param;
use super::{
    canonicalize_link, clean_html_text, find_job_posting, ld_json_objects, parse_date_any,
    PageRequest, ParseError, SourceAdapter,
};

const BASE_URL: &str = "https://ch.talent.com/fr/jobs";
const DETAIL_ORIGIN: &str = "https://ch.talent.com";

static PAGE_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]p=(\d+)").expect("page link regex"));

pub struct TalentAdapter;

impl TalentAdapter {
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
        url.query_pairs_mut()
            .append_pair("k", search.term.trim())
            .append_pair("l", &search.location);
        url.to_string()
    }
}

impl Default for TalentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for TalentAdapter {
    fn source_id(&self) -> &'static str {
        "talent"
    }

    fn recognize(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let host_ok = parsed
            .host_str()
            .is_some_and(|h| h.to_ascii_lowercase().ends_with("talent.com"));
        host_ok
            && parsed.path().ends_with("/view")
            && parsed.query().is_some_and(|q| q.contains("id="))
    }

    fn search_request(&self, search: &SearchConfig) -> PageRequest {
        PageRequest::get(self.base_search_url(search))
    }

    fn page_request(&self, search: &SearchConfig, page: u32) -> PageRequest {
        PageRequest::get(set_page_param(&self.base_search_url(search), "p", page))
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

        // Highest p= value linked anywhere on the page; only meaningful when
        // greater than one.
        let total_pages = PAGE_LINK_RE
            .captures_iter(body)
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
            .filter(|&max_page| max_page > 1);

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
                .and_then(|c| clean_html_text(c, 160));
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
                .and_then(|d| clean_html_text(d, 3500));
            record.posting_date = posting
                .get("datePosted")
                .and_then(Value::as_str)
                .and_then(parse_date_any);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_view_urls_with_id() {
        let adapter = TalentAdapter::new();
        assert!(adapter.recognize("https://ch.talent.com/fr/view?id=abc123"));
        assert!(!adapter.recognize("https://ch.talent.com/fr/view"));
        assert!(!adapter.recognize("https://ch.talent.com/fr/jobs?k=&l=Gen%C3%A8ve"));
    }

    #[test]
    fn dynamic_mode_without_pagination_links() {
        let adapter = TalentAdapter::new();
        let page = adapter
            .extract_listing_page(r#"<a href="/fr/view?id=1">job</a>"#)
            .unwrap();
        assert_eq!(page.total_pages, None);
        assert_eq!(page.summaries.len(), 1);
    }

    #[test]
    fn total_pages_from_pagination_links() {
        let adapter = TalentAdapter::new();
        let body = r#"
            <a href="/fr/view?id=1">job</a>
            <a href="/fr/jobs?k=&l=x&p=2">2</a>
            <a href="/fr/jobs?k=&l=x&p=7">7</a>
        "#;
        let page = adapter.extract_listing_page(body).unwrap();
        assert_eq!(page.total_pages, Some(7));
    }

    #[test]
    fn missing_sections_degrade_to_none() {
        let adapter = TalentAdapter::new();
        let body = r#"<script type="application/ld+json">
            {"@type": "JobPosting", "title": "Data Analyst"}</script>"#;
        let record = adapter
            .extract_detail(body, "https://ch.talent.com/fr/view?id=9")
            .unwrap();
        assert_eq!(record.title.as_deref(), Some("Data Analyst"));
        assert_eq!(record.company, None);
        assert_eq!(record.posting_date, None);
    }
}
