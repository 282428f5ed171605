//! One full crawl run for a single source: discover, fetch details, filter,
//! merge, project and persist.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::adapters::{FeedEntry, PageFetcher, SourceAdapter};
use crate::application::detail::DetailFetcher;
use crate::application::pagination::{PaginationController, StopReason};
use crate::domain::language::{Language, RelevanceFilter};
use crate::domain::merge::merge_by_url;
use crate::domain::record::JobRecord;
use crate::domain::window::DateWindow;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::export;
use crate::infrastructure::storage::{CrawlState, DatasetStore};

/// What one run did, for operators and tests.
#[derive(Debug)]
pub struct RunSummary {
    pub source: String,
    pub pages_fetched: u32,
    pub stop: StopReason,
    pub links_discovered: usize,
    pub fresh_records: usize,
    pub merged_total: usize,
    pub records_written: usize,
    pub seen_urls: usize,
}

pub struct CrawlEngine<'a> {
    adapter: &'a dyn SourceAdapter,
    fetcher: &'a dyn PageFetcher,
    store: &'a dyn DatasetStore,
    config: &'a AppConfig,
}

impl<'a> CrawlEngine<'a> {
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        fetcher: &'a dyn PageFetcher,
        store: &'a dyn DatasetStore,
        config: &'a AppConfig,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            store,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let source = self.adapter.source_id();
        let request_delay = Duration::from_millis(self.config.http.request_delay_ms);

        // Prior output and seen-set state; both tolerate missing files.
        let existing = self.store.load_records().await;
        let state = self.store.load_state().await;
        let mut known: HashSet<String> = existing
            .iter()
            .map(|record| record.url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        known.extend(
            state
                .seen_urls
                .iter()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        );
        if !known.is_empty() {
            info!(
                source,
                known_urls = known.len(),
                state_file = %self.store.state_path().display(),
                "incremental run"
            );
        }

        let feed = self.load_companion_feed().await;

        let discovery = PaginationController::new(
            self.adapter,
            self.fetcher,
            &self.config.search,
            &self.config.limits,
            request_delay,
            &known,
        )
        .run()
        .await;
        let discovered_urls: Vec<String> = discovery
            .summaries
            .iter()
            .map(|summary| summary.url.clone())
            .collect();
        let links_discovered = discovered_urls.len();
        info!(links = links_discovered, "unique links discovered");

        let window = DateWindow::from_config(self.config.limits.window_days);
        let today = Utc::now().date_naive();
        let max_details = (self.config.limits.max_detail_fetches > 0)
            .then_some(self.config.limits.max_detail_fetches as usize);

        let mut fresh = DetailFetcher::new(self.adapter, self.fetcher, window, request_delay)
            .run(discovery.summaries, &known, max_details, &feed, today)
            .await;

        if self.config.filter.language_filter {
            let target = Language::from_code(&self.config.filter.target_language)
                .unwrap_or(Language::French);
            let filter = RelevanceFilter::new(target);
            let before = fresh.len();
            fresh.retain(|record| filter.accept(record));
            if fresh.len() < before {
                info!(
                    rejected = before - fresh.len(),
                    target = target.code(),
                    "relevance filter applied"
                );
            }
        }
        let fresh_count = fresh.len();
        info!(fresh = fresh_count, "new records fetched");

        let mut merged = merge_by_url(existing, fresh);
        for record in &mut merged {
            if record.source.trim().is_empty() {
                record.source = source.to_string();
            }
        }

        // Public dataset is date-window filtered; the seen-set is not.
        let output: Vec<JobRecord> = merged
            .iter()
            .filter(|record| window.contains(record.posting_date, today))
            .cloned()
            .collect();

        let seen_now: BTreeSet<String> = known
            .iter()
            .cloned()
            .chain(discovered_urls)
            .chain(merged.iter().map(|record| record.url.clone()))
            .filter(|url| !url.trim().is_empty())
            .collect();

        let new_state = self.build_state(&seen_now);
        self.store
            .save_state(&new_state)
            .await
            .context("failed to persist crawl state")?;
        info!(
            state_file = %self.store.state_path().display(),
            seen_urls = seen_now.len(),
            "state saved"
        );

        self.store
            .save_records(&output)
            .await
            .context("failed to persist dataset")?;
        info!(
            dataset = %self.store.dataset_path().display(),
            records = output.len(),
            "dataset saved"
        );

        if self.config.output.save_csv {
            let csv_path = export::csv_path_for(self.store.dataset_path());
            export::write_csv(&csv_path, &output)
                .await
                .context("failed to write CSV export")?;
            info!(csv = %csv_path.display(), "CSV export saved");
        }

        Ok(RunSummary {
            source: source.to_string(),
            pages_fetched: discovery.pages_fetched,
            stop: discovery.stop,
            links_discovered,
            fresh_records: fresh_count,
            merged_total: merged.len(),
            records_written: output.len(),
            seen_urls: seen_now.len(),
        })
    }

    async fn load_companion_feed(&self) -> HashMap<String, FeedEntry> {
        let Some(request) = self.adapter.feed_request() else {
            return HashMap::new();
        };
        let bytes = match self.fetcher.fetch_bytes(&request).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "companion feed unavailable, continuing without it");
                return HashMap::new();
            }
        };
        match self.adapter.parse_feed(&bytes) {
            Ok(entries) => {
                info!(entries = entries.len(), "companion feed loaded");
                entries
            }
            Err(err) => {
                warn!(error = %err, "companion feed unreadable, continuing without it");
                HashMap::new()
            }
        }
    }

    fn build_state(&self, seen_now: &BTreeSet<String>) -> CrawlState {
        let mut state = CrawlState {
            last_run_at: Some(Utc::now()),
            seen_urls: seen_now.iter().cloned().collect(),
            output_json: Some(self.store.dataset_path().display().to_string()),
            context: serde_json::Map::new(),
        };
        if !self.config.search.location.trim().is_empty() {
            state.context.insert(
                "location".to_string(),
                Value::String(self.config.search.location.clone()),
            );
        }
        if !self.config.search.term.trim().is_empty() {
            state.context.insert(
                "term".to_string(),
                Value::String(self.config.search.term.clone()),
            );
        }
        state
    }
}
