//! End-to-end engine runs against an in-memory fetcher and a temp-dir store:
//! id stability, seen-set growth and date-window projection across runs.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

use job_harvest::adapters::{
    FetchError, FetchedPage, PageFetcher, PageRequest, ParseError, SourceAdapter,
};
use job_harvest::application::{CrawlEngine, StopReason};
use job_harvest::domain::record::{JobRecord, ListingPage, ListingSummary};
use job_harvest::infrastructure::config::{AppConfig, SearchConfig};
use job_harvest::infrastructure::storage::state_path_for;
use job_harvest::infrastructure::{DatasetStore, JsonFileStore};

/// Adapter over a fake site: listing bodies are newline-separated job URLs,
/// detail bodies are `title|YYYY-MM-DD` lines.
struct StubAdapter;

impl SourceAdapter for StubAdapter {
    fn source_id(&self) -> &'static str {
        "stub"
    }

    fn recognize(&self, url: &str) -> bool {
        url.starts_with("https://stub.test/job/")
    }

    fn search_request(&self, _search: &SearchConfig) -> PageRequest {
        PageRequest::get("https://stub.test/search?page=1")
    }

    fn page_request(&self, _search: &SearchConfig, page: u32) -> PageRequest {
        PageRequest::get(format!("https://stub.test/search?page={page}"))
    }

    fn extract_listing_page(&self, body: &str) -> Result<ListingPage, ParseError> {
        let summaries = body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ListingSummary::new)
            .collect();
        Ok(ListingPage::from_summaries(summaries))
    }

    fn extract_detail(&self, body: &str, url: &str) -> Result<JobRecord, ParseError> {
        let mut record = JobRecord::new(self.source_id(), url);
        if let Some((title, date)) = body.split_once('|') {
            record.title = Some(title.to_string());
            record.posting_date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok();
        }
        Ok(record)
    }
}

struct MapFetcher {
    pages: HashMap<String, String>,
}

impl MapFetcher {
    fn new(pages: Vec<(String, String)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
        }
    }
}

#[async_trait]
impl PageFetcher for MapFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, FetchError> {
        self.pages
            .get(&request.url)
            .map(|body| FetchedPage {
                url: request.url.clone(),
                status: 200,
                body: body.clone(),
            })
            .ok_or_else(|| FetchError::Network {
                url: request.url.clone(),
                reason: "no such page".to_string(),
            })
    }

    async fn fetch_bytes(&self, request: &PageRequest) -> Result<Vec<u8>, FetchError> {
        self.fetch(request).await.map(|page| page.body.into_bytes())
    }
}

fn job_url(name: &str) -> String {
    format!("https://stub.test/job/{name}")
}

fn detail_body(title: &str, days_ago: i64) -> String {
    let date = Utc::now().date_naive() - ChronoDuration::days(days_ago);
    format!("{title}|{}", date.format("%Y-%m-%d"))
}

fn config(window_days: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.limits.window_days = window_days;
    config.limits.stop_after_seen = 0;
    config.http.request_delay_ms = 0;
    config
}

fn listing(urls: &[&str]) -> String {
    urls.iter().map(|name| job_url(name)).collect::<Vec<_>>().join("\n")
}

#[tokio::test]
async fn first_run_builds_dataset_and_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("professions.json"));
    let adapter = StubAdapter;
    let config = config(30);

    let fetcher = MapFetcher::new(vec![
        ("https://stub.test/search?page=1".into(), listing(&["a", "b"])),
        ("https://stub.test/search?page=2".into(), listing(&["c"])),
        ("https://stub.test/search?page=3".into(), String::new()),
        (job_url("a"), detail_body("Job A", 1)),
        (job_url("b"), detail_body("Job B", 2)),
        (job_url("c"), detail_body("Job C", 3)),
    ]);

    let summary = CrawlEngine::new(&adapter, &fetcher, &store, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::EndOfResults);
    assert_eq!(summary.fresh_records, 3);
    assert_eq!(summary.records_written, 3);

    let records = store.load_records().await;
    assert_eq!(records.len(), 3);
    // Discovery order a, b, c gets ids 1, 2, 3; output is id-descending.
    let ids: Vec<_> = records.iter().map(|r| (r.url.clone(), r.id.unwrap())).collect();
    assert_eq!(
        ids,
        vec![(job_url("c"), 3), (job_url("b"), 2), (job_url("a"), 1)]
    );

    let state = store.load_state().await;
    assert_eq!(state.seen_urls.len(), 3);
    assert!(state.last_run_at.is_some());
    assert!(state_path_for(&dir.path().join("professions.json")).exists());
}

#[tokio::test]
async fn second_run_keeps_ids_and_fetches_only_new_urls() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("professions.json");
    let adapter = StubAdapter;
    let config = config(30);

    let store = JsonFileStore::new(&dataset);
    let run1 = MapFetcher::new(vec![
        ("https://stub.test/search?page=1".into(), listing(&["a", "b"])),
        ("https://stub.test/search?page=2".into(), String::new()),
        (job_url("a"), detail_body("Job A", 1)),
        (job_url("b"), detail_body("Job B", 2)),
    ]);
    CrawlEngine::new(&adapter, &run1, &store, &config)
        .run()
        .await
        .unwrap();

    // Second run: one new listing on top; old detail pages now return an
    // updated title for "a", but "a" must not be re-fetched at all.
    let run2 = MapFetcher::new(vec![
        (
            "https://stub.test/search?page=1".into(),
            listing(&["new", "a", "b"]),
        ),
        ("https://stub.test/search?page=2".into(), String::new()),
        (job_url("new"), detail_body("Job New", 0)),
        (job_url("a"), detail_body("Job A retitled", 1)),
    ]);
    let summary = CrawlEngine::new(&adapter, &run2, &store, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.fresh_records, 1);

    let records = store.load_records().await;
    let by_url: HashMap<String, &JobRecord> =
        records.iter().map(|r| (r.url.clone(), r)).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(by_url[&job_url("a")].id, Some(1));
    assert_eq!(by_url[&job_url("b")].id, Some(2));
    assert_eq!(by_url[&job_url("new")].id, Some(3));
    // Not re-fetched, so the original title is retained.
    assert_eq!(by_url[&job_url("a")].title.as_deref(), Some("Job A"));
}

#[tokio::test]
async fn seen_set_grows_even_when_the_output_shrinks() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("professions.json");
    let adapter = StubAdapter;
    let store = JsonFileStore::new(&dataset);

    // Run 1 without a window: an old posting enters the dataset.
    let run1 = MapFetcher::new(vec![
        ("https://stub.test/search?page=1".into(), listing(&["old"])),
        ("https://stub.test/search?page=2".into(), String::new()),
        (job_url("old"), detail_body("Old job", 60)),
    ]);
    CrawlEngine::new(&adapter, &run1, &store, &config(0))
        .run()
        .await
        .unwrap();
    assert_eq!(store.load_records().await.len(), 1);
    let seen_before: HashSet<String> = store.load_state().await.seen_urls.into_iter().collect();

    // Run 2 with a 30-day window: the record ages out of the output, but its
    // URL stays seen so it will never be fetched again.
    let run2 = MapFetcher::new(vec![
        ("https://stub.test/search?page=1".into(), listing(&["old"])),
        ("https://stub.test/search?page=2".into(), String::new()),
    ]);
    CrawlEngine::new(&adapter, &run2, &store, &config(30))
        .run()
        .await
        .unwrap();

    assert!(store.load_records().await.is_empty());
    let seen_after: HashSet<String> = store.load_state().await.seen_urls.into_iter().collect();
    assert!(seen_after.is_superset(&seen_before));
    assert!(seen_after.contains(&job_url("old")));
}

#[tokio::test]
async fn page_failure_still_persists_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("professions.json"));
    let adapter = StubAdapter;
    let config = config(30);

    // Page 2 fails at the network level; page 1's job still lands.
    let fetcher = MapFetcher::new(vec![
        ("https://stub.test/search?page=1".into(), listing(&["a"])),
        (job_url("a"), detail_body("Job A", 1)),
    ]);

    let summary = CrawlEngine::new(&adapter, &fetcher, &store, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::FetchFailed);
    assert_eq!(summary.records_written, 1);
    assert_eq!(store.load_records().await.len(), 1);
}

#[tokio::test]
async fn csv_export_lands_next_to_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("professions.json");
    let store = JsonFileStore::new(&dataset);
    let adapter = StubAdapter;
    let mut config = config(30);
    config.output.save_csv = true;

    let fetcher = MapFetcher::new(vec![
        ("https://stub.test/search?page=1".into(), listing(&["a"])),
        ("https://stub.test/search?page=2".into(), String::new()),
        (job_url("a"), detail_body("Job A", 1)),
    ]);
    CrawlEngine::new(&adapter, &fetcher, &store, &config)
        .run()
        .await
        .unwrap();

    let csv = std::fs::read_to_string(dir.path().join("professions.csv")).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,source,title"));
    assert!(lines.next().unwrap().contains("Job A"));
}
