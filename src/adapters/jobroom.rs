//! job-room.ch (SECO/RAV) source adapter.
//!
//! The only non-HTML source: a JSON search API queried with a POST body and
//! 0-indexed paging parameters. Result rows are complete records, so detail
//! pages are never fetched; record URLs frequently point at third-party
//! career sites. The API reports `totalElements`, which drives the
//! controller's total-count stop.

use serde_json::{json, Map, Value};

use crate::domain::record::{JobRecord, ListingPage, ListingSummary};
use crate::infrastructure::config::SearchConfig;

use super::{parse_date_any, PageRequest, ParseError, SourceAdapter};

const BASE_URL: &str = "https://www.job-room.ch";
const SEARCH_ENDPOINT: &str = "/jobadservice/api/jobAdvertisements/_search";
const PAGE_SIZE: u32 = 25;
const DEFAULT_ONLINE_SINCE: u64 = 3650;
const DEFAULT_RADIUS_KM: u64 = 30;

/// Search localities by canton code: communal code and geo point.
const LOCALITIES: [(&str, &str, f64, f64); 6] = [
    ("GE", "6621", 46.222, 6.124),
    ("VD", "5586", 46.516, 6.632),
    ("FR", "2196", 46.806, 7.162),
    ("NE", "6454", 46.991, 6.931),
    ("VS", "6155", 46.233, 7.362),
    ("BE", "351", 46.948, 7.447),
];

/// API language parameter values (`_ng`), keyed by ISO code.
const LANG_TO_NG: [(&str, &str); 4] = [
    ("fr", "ZnI="),
    ("de", "ZGU="),
    ("it", "aXQ="),
    ("en", "ZW4="),
];

pub struct JobroomAdapter {
    /// Preferred language for the API (`_ng` parameter) and for picking
    /// among a row's per-language descriptions. Fixed per run.
    preferred_lang: &'static str,
}

impl JobroomAdapter {
    pub fn new() -> Self {
        Self {
            preferred_lang: "fr",
        }
    }

    /// Read the run language from the search extras (`"lang"`), defaulting
    /// to French for anything unknown.
    pub fn from_search(search: &SearchConfig) -> Self {
        let requested = search
            .extra_str("lang")
            .unwrap_or("fr")
            .trim()
            .to_ascii_lowercase();
        let preferred_lang = LANG_TO_NG
            .iter()
            .find(|(code, _)| *code == requested)
            .map(|(code, _)| *code)
            .unwrap_or("fr");
        Self { preferred_lang }
    }

    fn locality(search: &SearchConfig) -> (&'static str, f64, f64) {
        let canton = search.location.trim().to_ascii_uppercase();
        LOCALITIES
            .iter()
            .find(|(code, _, _, _)| *code == canton)
            .or_else(|| LOCALITIES.first())
            .map(|(_, communal, lat, lon)| (*communal, *lat, *lon))
            .expect("locality table is non-empty")
    }

    fn build_request(&self, search: &SearchConfig, page: u32) -> PageRequest {
        let (communal_code, lat, lon) = Self::locality(search);
        let radius = search.extra_u64("radius").unwrap_or(DEFAULT_RADIUS_KM);
        let online_since = search
            .extra_u64("online_since")
            .unwrap_or(DEFAULT_ONLINE_SINCE)
            .max(1);
        let keywords: Vec<&str> = if search.term.trim().is_empty() {
            Vec::new()
        } else {
            vec![search.term.trim()]
        };

        let body = json!({
            "workloadPercentageMin": 10,
            "workloadPercentageMax": 100,
            "permanent": null,
            "companyName": null,
            "onlineSince": online_since,
            "displayRestricted": false,
            "professionCodes": [],
            "keywords": keywords,
            "communalCodes": [communal_code],
            "cantonCodes": [],
            "radiusSearchRequest": {
                "geoPoint": {"lat": lat, "lon": lon},
                "distance": radius,
            },
        });

        let ng = LANG_TO_NG
            .iter()
            .find(|(code, _)| *code == self.preferred_lang)
            .map(|(_, ng)| *ng)
            .expect("normalized language is in the table");
        let url = format!(
            "{BASE_URL}{SEARCH_ENDPOINT}?sort=date_desc&_ng={ng}&page={}&size={PAGE_SIZE}",
            page.saturating_sub(1) // the API is 0-indexed
        );

        PageRequest::post_json(url, body)
            .with_header("Accept", "application/json, text/plain, */*")
            .with_header("Origin", BASE_URL)
            .with_header("Referer", format!("{BASE_URL}/job-search"))
    }

    fn normalize(&self, item: &Value, preferred_lang: &str) -> Option<ListingSummary> {
        let ad = item.get("jobAdvertisement").unwrap_or(item);
        let content = ad.get("jobContent").cloned().unwrap_or(Value::Null);

        let external_id = ad
            .get("id")
            .or_else(|| ad.get("stellennummerEgov"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let external_url = content
            .get("externalUrl")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let url = if !external_url.is_empty() {
            external_url
        } else if !external_id.is_empty() {
            format!("{BASE_URL}/job-search/detail/{external_id}")
        } else {
            return None;
        };

        let mut summary = ListingSummary::new(url);

        let descriptions: Vec<&Value> = content
            .get("jobDescriptions")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter(|d| d.is_object()).collect())
            .unwrap_or_default();
        let (title, description) = pick_description(&descriptions, preferred_lang);
        summary.title = title;
        summary.description = description.map(|d| d.chars().take(2500).collect());
        summary.language_tags = {
            let mut codes: Vec<String> = descriptions
                .iter()
                .filter_map(|d| d.get("languageIsoCode").and_then(Value::as_str))
                .map(|c| c.trim().to_ascii_lowercase())
                .filter(|c| !c.is_empty())
                .collect();
            codes.sort();
            codes.dedup();
            codes
        };

        summary.company = content
            .get("employer")
            .and_then(|e| e.get("name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let location = content.get("location").cloned().unwrap_or(Value::Null);
        summary.location = location
            .get("city")
            .or_else(|| location.get("communalName"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let publication = ad.get("publication").cloned().unwrap_or(Value::Null);
        summary.posting_date = publication
            .get("startDate")
            .or_else(|| ad.get("createdTime"))
            .and_then(Value::as_str)
            .and_then(parse_date_any);
        summary.deadline_date = publication
            .get("endDate")
            .and_then(Value::as_str)
            .and_then(parse_date_any);

        let mut extras = Map::new();
        if let Some(zip) = location.get("zipCode").and_then(Value::as_str) {
            if !zip.trim().is_empty() {
                extras.insert("postal_code".to_string(), Value::String(zip.trim().to_string()));
            }
        }
        if let Some(canton) = location.get("cantonCode").and_then(Value::as_str) {
            if !canton.trim().is_empty() {
                extras.insert("canton".to_string(), Value::String(canton.trim().to_string()));
            }
        }
        let employment = content.get("employment").cloned().unwrap_or(Value::Null);
        if let Some(workload) = format_workload(&employment) {
            extras.insert("workload".to_string(), Value::String(workload));
        }
        if let Some(permanent) = employment.get("permanent").and_then(Value::as_bool) {
            let contract = if permanent { "permanent" } else { "temporary" };
            extras.insert("contract_type".to_string(), Value::String(contract.to_string()));
        }
        if !external_id.is_empty() {
            extras.insert("external_id".to_string(), Value::String(external_id));
        }
        extras.insert(
            "rav_exclusive".to_string(),
            Value::Bool(ad.get("reportingObligation").and_then(Value::as_bool).unwrap_or(false)),
        );
        summary.extras = extras;

        Some(summary)
    }
}

impl Default for JobroomAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for JobroomAdapter {
    fn source_id(&self) -> &'static str {
        "jobroom"
    }

    fn recognize(&self, url: &str) -> bool {
        url.trim_start()
            .to_ascii_lowercase()
            .starts_with("https://www.job-room.ch/job-search/detail/")
    }

    fn search_request(&self, search: &SearchConfig) -> PageRequest {
        self.build_request(search, 1)
    }

    fn page_request(&self, search: &SearchConfig, page: u32) -> PageRequest {
        self.build_request(search, page)
    }

    fn extract_listing_page(&self, body: &str) -> Result<ListingPage, ParseError> {
        let data: Value = serde_json::from_str(body).map_err(|e| ParseError::Json {
            reason: e.to_string(),
        })?;

        let rows: Vec<&Value> = ["content", "jobs", "results"]
            .iter()
            .find_map(|key| data.get(*key).and_then(Value::as_array))
            .or_else(|| data.as_array())
            .map(|list| list.iter().filter(|v| v.is_object()).collect())
            .unwrap_or_default();

        let total_count = data
            .get("totalElements")
            .or_else(|| data.get("total"))
            .and_then(Value::as_u64);

        let summaries = rows
            .iter()
            .filter_map(|item| self.normalize(item, self.preferred_lang))
            .collect();

        Ok(ListingPage {
            summaries,
            total_pages: None,
            total_count,
        })
    }

    fn extract_detail(&self, _body: &str, _url: &str) -> Result<JobRecord, ParseError> {
        Err(ParseError::DetailUnsupported {
            source_id: self.source_id(),
        })
    }

    fn detail_request(&self, _url: &str) -> Option<PageRequest> {
        None
    }

    fn page_size(&self) -> Option<u32> {
        Some(PAGE_SIZE)
    }
}

/// Pick the title/description pair for the preferred language, falling back
/// through fr/de/it/en and finally the first entry.
fn pick_description(
    descriptions: &[&Value],
    preferred_lang: &str,
) -> (Option<String>, Option<String>) {
    let pick = |lang: &str| -> (Option<String>, Option<String>) {
        for d in descriptions {
            let matches = d
                .get("languageIsoCode")
                .and_then(Value::as_str)
                .is_some_and(|c| c.trim().eq_ignore_ascii_case(lang));
            if matches {
                return (field(d, "title"), field(d, "description"));
            }
        }
        (None, None)
    };

    let (mut title, mut description) = pick(preferred_lang);
    if title.is_none() && description.is_none() {
        for alt in ["fr", "de", "it", "en"] {
            let (t, d) = pick(alt);
            if t.is_some() || d.is_some() {
                title = t;
                description = d;
                break;
            }
        }
    }
    if let Some(first) = descriptions.first() {
        if title.is_none() {
            title = field(first, "title");
        }
        if description.is_none() {
            description = field(first, "description");
        }
    }
    (title, description)
}

fn field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn format_workload(employment: &Value) -> Option<String> {
    let min = employment.get("workloadPercentageMin").and_then(Value::as_f64);
    let max = employment.get("workloadPercentageMax").and_then(Value::as_f64);
    match (min, max) {
        (Some(min), Some(max)) => Some(format!("{}-{}%", min as i64, max as i64)),
        (None, Some(max)) => Some(format!("{}%", max as i64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Value {
        json!({
            "jobAdvertisement": {
                "id": "ad-123",
                "reportingObligation": true,
                "publication": {"startDate": "2025-04-10", "endDate": "2025-05-10"},
                "jobContent": {
                    "externalUrl": "",
                    "jobDescriptions": [
                        {"languageIsoCode": "de", "title": "Koch", "description": "Deutsche Beschreibung"},
                        {"languageIsoCode": "fr", "title": "Cuisinier", "description": "Description française"}
                    ],
                    "employer": {"name": "Restaurant du Lac"},
                    "location": {"city": "Genève", "zipCode": "1201", "cantonCode": "GE"},
                    "employment": {"workloadPercentageMin": 80, "workloadPercentageMax": 100, "permanent": true}
                }
            }
        })
    }

    #[test]
    fn rows_normalize_into_full_summaries() {
        let adapter = JobroomAdapter::new();
        let body = json!({"content": [sample_row()], "totalElements": 60}).to_string();
        let page = adapter.extract_listing_page(&body).unwrap();

        assert_eq!(page.total_count, Some(60));
        assert_eq!(page.summaries.len(), 1);

        let summary = &page.summaries[0];
        assert_eq!(summary.url, "https://www.job-room.ch/job-search/detail/ad-123");
        assert_eq!(summary.title.as_deref(), Some("Cuisinier"));
        assert_eq!(summary.description.as_deref(), Some("Description française"));
        assert_eq!(summary.company.as_deref(), Some("Restaurant du Lac"));
        assert_eq!(summary.language_tags, vec!["de", "fr"]);
        assert_eq!(
            summary.posting_date,
            chrono::NaiveDate::from_ymd_opt(2025, 4, 10)
        );
        assert_eq!(
            summary.deadline_date,
            chrono::NaiveDate::from_ymd_opt(2025, 5, 10)
        );
        assert_eq!(
            summary.extras.get("workload").and_then(Value::as_str),
            Some("80-100%")
        );
        assert_eq!(
            summary.extras.get("contract_type").and_then(Value::as_str),
            Some("permanent")
        );
        assert_eq!(summary.extras.get("rav_exclusive"), Some(&Value::Bool(true)));
    }

    #[test]
    fn external_url_wins_over_synthesized_detail_url() {
        let adapter = JobroomAdapter::new();
        let mut row = sample_row();
        row["jobAdvertisement"]["jobContent"]["externalUrl"] =
            Value::String("https://careers.example.com/p/1".to_string());
        let body = json!({"content": [row]}).to_string();
        let page = adapter.extract_listing_page(&body).unwrap();
        assert_eq!(page.summaries[0].url, "https://careers.example.com/p/1");
    }

    #[test]
    fn rows_without_any_url_are_dropped() {
        let adapter = JobroomAdapter::new();
        let body = json!({"content": [{"jobAdvertisement": {"jobContent": {}}}]}).to_string();
        let page = adapter.extract_listing_page(&body).unwrap();
        assert!(page.summaries.is_empty());
    }

    #[test]
    fn broken_payload_is_a_loud_parse_error() {
        let adapter = JobroomAdapter::new();
        assert!(adapter.extract_listing_page("<html>blocked</html>").is_err());
    }

    #[test]
    fn requests_are_zero_indexed_posts() {
        let adapter = JobroomAdapter::new();
        let mut search = SearchConfig::default();
        search.location = "GE".to_string();
        let req = adapter.page_request(&search, 2);
        assert!(req.url.contains("page=1"));
        assert!(req.url.contains("size=25"));
        assert!(matches!(req.method, super::super::RequestMethod::PostJson(_)));
    }

    #[test]
    fn listing_data_is_authoritative() {
        let adapter = JobroomAdapter::new();
        assert!(adapter.detail_request("https://www.job-room.ch/job-search/detail/x").is_none());
        assert!(adapter.extract_detail("", "x").is_err());
    }
}
