//! ge.ch (Etat de Genève) source adapter.
//!
//! Listing cards carry inline metadata (department, activity rate, pay
//! class); detail pages are free-form prose, so dates come from a fixed
//! priority list of French phrases. A companion RSS feed keyed by detail URL
//! fills in posting dates and summaries the pages themselves omit.
//! The site paginates 0-indexed at the wire level: page 2 is `?page=1`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use crate::domain::record::{JobRecord, ListingPage, ListingSummary};
use crate::infrastructure::config::SearchConfig;

use super::{
    canonicalize_link, clean_html_text, clean_text, parse_date_any, FeedEntry, PageRequest,
    ParseError, SourceAdapter,
};

const BASE_URL: &str = "https://www.ge.ch";
const LIST_URL: &str = "https://www.ge.ch/offres-emploi-etat-geneve/liste-offres";
const RSS_URL: &str = "https://www.ge.ch/rss/offres-emploi-etat-geneve";

static DETAIL_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/offres-emploi-etat-geneve/liste-offres/\d+$").expect("detail path regex"));
static DEPARTMENT_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(organisation|justice\.ge\.ch)").expect("department href regex"));
static RATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Taux d.?activit[eé]\s*([\d\s%a-zA-Z.,\-]+?)(?:R[ée]mun[ée]ration|Classe|$)")
        .expect("rate regex")
});
static PAY_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)classe\s*(\d+)").expect("pay class regex"));
static PAY_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)R[ée]mun[ée]ration\s*([^|]+)").expect("pay text regex"));

static POSTED_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)publi[eé]\s*le[^\d]*(\d{1,2}[./]\d{1,2}[./]\d{2,4})",
        r"(?i)mise en ligne[^\d]*(\d{1,2}[./]\d{1,2}[./]\d{2,4})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("posted regex"))
    .collect()
});
static DEADLINE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)date limite[^\d]*(\d{1,2}[./]\d{1,2}[./]\d{2,4})",
        r"(?i)d[ée]lai de candidature[^\d]*(\d{1,2}[./]\d{1,2}[./]\d{2,4})",
        r"(?i)avant le[^\d]*(\d{1,2}[./]\d{1,2}[./]\d{2,4})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("deadline regex"))
    .collect()
});

pub struct GeAdapter;

impl GeAdapter {
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
        let mut url = Url::parse(LIST_URL).expect("list url");
        if let Some(domain_filter) = search.extra_u64("domaine") {
            url.query_pairs_mut()
                .append_pair("field_domaine_activite_target_id", &domain_filter.to_string());
        }
        url.to_string()
    }

    fn parse_card(&self, item: &ElementRef<'_>, url: String) -> ListingSummary {
        let mut summary = ListingSummary::new(url);

        let anchor = Selector::parse("a[href]").expect("anchor selector");
        for link in item.select(&anchor) {
            let href = link.value().attr("href").unwrap_or_default();
            let text = link.text().collect::<Vec<_>>().join(" ");
            if DETAIL_PATH_RE.is_match(href) && summary.title.is_none() {
                summary.title = clean_text(&text, 240);
            } else if DEPARTMENT_HREF_RE.is_match(href)
                && !summary.extras.contains_key("departement")
            {
                if let Some(department) = clean_text(&text, 160) {
                    summary
                        .extras
                        .insert("departement".to_string(), Value::String(department));
                }
            }
        }

        let card_text = item.text().collect::<Vec<_>>().join(" ");
        if let Some(rate) = RATE_RE
            .captures(&card_text)
            .and_then(|caps| clean_text(&caps[1], 120))
        {
            summary.extras.insert("taux".to_string(), Value::String(rate));
        }
        let pay = PAY_CLASS_RE
            .captures(&card_text)
            .map(|caps| format!("classe {}", &caps[1]))
            .or_else(|| {
                PAY_TEXT_RE
                    .captures(&card_text)
                    .and_then(|caps| clean_text(&caps[1], 120))
            });
        if let Some(pay) = pay {
            summary
                .extras
                .insert("remuneration".to_string(), Value::String(pay));
        }
        summary
    }
}

impl Default for GeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for GeAdapter {
    fn source_id(&self) -> &'static str {
        "ge"
    }

    fn recognize(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let host_ok = parsed
            .host_str()
            .is_some_and(|h| h.to_ascii_lowercase().ends_with("ge.ch"));
        host_ok && DETAIL_PATH_RE.is_match(parsed.path())
    }

    fn search_request(&self, search: &SearchConfig) -> PageRequest {
        PageRequest::get(self.base_search_url(search))
    }

    fn page_request(&self, search: &SearchConfig, page: u32) -> PageRequest {
        let base = self.base_search_url(search);
        if page <= 1 {
            return PageRequest::get(base);
        }
        let Ok(mut url) = Url::parse(&base) else {
            return PageRequest::get(base);
        };
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| name != "page")
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (name, value) in &kept {
                pairs.append_pair(name, value);
            }
            // Wire-level pages are 0-indexed.
            pairs.append_pair("page", &(page - 1).to_string());
        }
        PageRequest::get(url.to_string())
    }

    fn extract_listing_page(&self, body: &str) -> Result<ListingPage, ParseError> {
        let html = Html::parse_document(body);
        let item_selector = Selector::parse("li").expect("li selector");
        let anchor = Selector::parse("a[href]").expect("anchor selector");

        let mut summaries = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for item in html.select(&item_selector) {
            let Some(href) = item
                .select(&anchor)
                .filter_map(|a| a.value().attr("href"))
                .find(|&href| DETAIL_PATH_RE.is_match(href.split('#').next().unwrap_or(href)))
            else {
                continue;
            };
            let Some(full) = canonicalize_link(BASE_URL, href) else {
                continue;
            };
            if !self.recognize(&full) || !seen.insert(full.clone()) {
                continue;
            }
            summaries.push(self.parse_card(&item, full));
        }

        Ok(ListingPage::from_summaries(summaries))
    }

    fn extract_detail(&self, body: &str, url: &str) -> Result<JobRecord, ParseError> {
        let html = Html::parse_document(body);
        let mut record = JobRecord::new(self.source_id(), url);

        let h1 = Selector::parse("h1").expect("h1 selector");
        record.title = html
            .select(&h1)
            .next()
            .and_then(|el| clean_text(&el.text().collect::<Vec<_>>().join(" "), 240));

        let paragraph = Selector::parse("p").expect("p selector");
        record.description = html
            .select(&paragraph)
            .map(|p| p.text().collect::<Vec<_>>().join(" "))
            .find(|text| text.trim().len() > 80)
            .and_then(|text| clean_text(&text, 2200));

        let main = Selector::parse("main, article").expect("main selector");
        let page_text = html
            .select(&main)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_else(|| html.root_element().text().collect::<Vec<_>>().join(" "));

        record.posting_date = POSTED_RES
            .iter()
            .find_map(|re| re.captures(&page_text).and_then(|caps| parse_date_any(&caps[1])));
        record.deadline_date = DEADLINE_RES
            .iter()
            .find_map(|re| re.captures(&page_text).and_then(|caps| parse_date_any(&caps[1])));

        Ok(record)
    }

    fn feed_request(&self) -> Option<PageRequest> {
        Some(PageRequest::get(RSS_URL))
    }

    fn parse_feed(&self, body: &[u8]) -> Result<HashMap<String, FeedEntry>, ParseError> {
        let feed = feed_rs::parser::parse(body).map_err(|e| ParseError::Feed {
            reason: e.to_string(),
        })?;

        let mut entries = HashMap::new();
        for entry in feed.entries {
            let Some(link) = entry.links.first().map(|l| l.href.trim().to_string()) else {
                continue;
            };
            if link.is_empty() {
                continue;
            }
            entries.insert(
                link,
                FeedEntry {
                    title: entry
                        .title
                        .as_ref()
                        .and_then(|t| clean_text(&t.content, 240)),
                    summary: entry
                        .summary
                        .as_ref()
                        .and_then(|s| clean_html_text(&s.content, 1200)),
                    posting_date: entry.published.map(|dt| dt.date_naive()),
                },
            );
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_HTML: &str = r#"
        <ul>
          <li>
            <a href="/offres-emploi-etat-geneve/liste-offres/12345">Adjoint·e scientifique</a>
            <a href="/organisation/office-cantonal">Office cantonal de l'emploi</a>
            Taux d'activité 80 - 100% Rémunération classe 15
          </li>
          <li><a href="/autre-page">non-job item</a></li>
        </ul>
    "#;

    #[test]
    fn cards_yield_summaries_with_extras() {
        let adapter = GeAdapter::new();
        let page = adapter.extract_listing_page(CARD_HTML).unwrap();
        assert_eq!(page.summaries.len(), 1);

        let summary = &page.summaries[0];
        assert_eq!(
            summary.url,
            "https://www.ge.ch/offres-emploi-etat-geneve/liste-offres/12345"
        );
        assert_eq!(summary.title.as_deref(), Some("Adjoint·e scientifique"));
        assert_eq!(
            summary.extras.get("departement").and_then(Value::as_str),
            Some("Office cantonal de l'emploi")
        );
        assert_eq!(
            summary.extras.get("remuneration").and_then(Value::as_str),
            Some("classe 15")
        );
        assert!(summary.extras.get("taux").is_some());
    }

    #[test]
    fn wire_pages_are_zero_indexed() {
        let adapter = GeAdapter::new();
        let search = SearchConfig::default();
        assert!(!adapter.page_request(&search, 1).url.contains("page="));
        assert!(adapter.page_request(&search, 2).url.contains("page=1"));
    }

    #[test]
    fn detail_dates_follow_priority_order() {
        let adapter = GeAdapter::new();
        let body = r#"
            <main>
              <h1>Greffier·ère</h1>
              <p>Au sein du pouvoir judiciaire, vous assurez le suivi des procédures
                 et la tenue des audiences pour l'ensemble des juridictions civiles.</p>
              <p>Publié le 03.06.2025. Délai de candidature 30.06.2025.</p>
            </main>
        "#;
        let record = adapter
            .extract_detail(
                body,
                "https://www.ge.ch/offres-emploi-etat-geneve/liste-offres/12345",
            )
            .unwrap();
        assert_eq!(record.title.as_deref(), Some("Greffier·ère"));
        assert!(record.description.is_some());
        assert_eq!(record.posting_date, chrono::NaiveDate::from_ymd_opt(2025, 6, 3));
        assert_eq!(
            record.deadline_date,
            chrono::NaiveDate::from_ymd_opt(2025, 6, 30)
        );
    }

    #[test]
    fn feed_entries_are_keyed_by_link() {
        let adapter = GeAdapter::new();
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0"><channel>
              <title>Offres</title>
              <item>
                <title>Bibliothécaire</title>
                <link>https://www.ge.ch/offres-emploi-etat-geneve/liste-offres/777</link>
                <description>&lt;p&gt;Gestion des collections.&lt;/p&gt;</description>
                <pubDate>Tue, 03 Jun 2025 08:00:00 +0200</pubDate>
              </item>
            </channel></rss>"#;
        let entries = adapter.parse_feed(rss.as_bytes()).unwrap();
        let entry = entries
            .get("https://www.ge.ch/offres-emploi-etat-geneve/liste-offres/777")
            .unwrap();
        assert_eq!(entry.title.as_deref(), Some("Bibliothécaire"));
        assert_eq!(entry.summary.as_deref(), Some("Gestion des collections."));
        assert_eq!(
            entry.posting_date,
            chrono::NaiveDate::from_ymd_opt(2025, 6, 3)
        );
    }

    #[test]
    fn malformed_feed_is_a_parse_error() {
        let adapter = GeAdapter::new();
        assert!(adapter.parse_feed(b"this is not xml").is_err());
    }
}
