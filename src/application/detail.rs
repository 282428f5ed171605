//! Detail fetcher: retrieves full records for newly discovered URLs and
//! resolves field conflicts between the detail page, the listing card and an
//! optional companion feed.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::adapters::{FeedEntry, PageFetcher, SourceAdapter};
use crate::domain::record::{JobRecord, ListingSummary};
use crate::domain::window::DateWindow;

pub struct DetailFetcher<'a> {
    adapter: &'a dyn SourceAdapter,
    fetcher: &'a dyn PageFetcher,
    window: DateWindow,
    request_delay: Duration,
}

impl<'a> DetailFetcher<'a> {
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        fetcher: &'a dyn PageFetcher,
        window: DateWindow,
        request_delay: Duration,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            window,
            request_delay,
        }
    }

    /// Fetch records for every discovered URL absent from the seen-set, in
    /// discovery order, up to `max_details`. Per-URL failures are logged and
    /// skipped; they never fail the run.
    pub async fn run(
        &self,
        discovered: Vec<ListingSummary>,
        known: &HashSet<String>,
        max_details: Option<usize>,
        feed: &HashMap<String, FeedEntry>,
        today: NaiveDate,
    ) -> Vec<JobRecord> {
        let mut candidates: Vec<ListingSummary> = discovered
            .into_iter()
            .filter(|summary| !known.contains(&summary.url))
            .collect();
        let total = candidates.len();
        if let Some(limit) = max_details {
            if candidates.len() > limit {
                candidates.truncate(limit);
                info!(limit, total, "detail fetch limit applied");
            }
        }
        info!(new_links = candidates.len(), "fetching details for new links");

        let mut fresh = Vec::new();
        let mut fetched_any = false;
        for (index, summary) in candidates.into_iter().enumerate() {
            let record = match self.adapter.detail_request(&summary.url) {
                // Listing data is authoritative for this source.
                None => summary.into_record(self.adapter.source_id()),
                Some(request) => {
                    if fetched_any && !self.request_delay.is_zero() {
                        tokio::time::sleep(self.request_delay).await;
                    }
                    fetched_any = true;
                    let page = match self.fetcher.fetch(&request).await {
                        Ok(page) => page,
                        Err(err) => {
                            warn!(url = %summary.url, error = %err, "detail fetch failed, skipping");
                            continue;
                        }
                    };
                    match self.adapter.extract_detail(&page.body, &summary.url) {
                        Ok(detail) => resolve_fields(detail, summary, feed),
                        Err(err) => {
                            error!(url = %summary.url, error = %err, "detail extraction failed, skipping");
                            continue;
                        }
                    }
                }
            };

            if !self.window.contains(record.posting_date, today) {
                debug!(url = %record.url, date = ?record.posting_date, "outside date window");
                continue;
            }
            fresh.push(record);

            if (index + 1) % 25 == 0 {
                info!(processed = index + 1, "details processed");
            }
        }
        fresh
    }
}

/// Per-field resolution: detail-page value, else listing-card value, else
/// companion-feed value, else none. Card extras sit beneath detail extras.
fn resolve_fields(
    mut record: JobRecord,
    summary: ListingSummary,
    feed: &HashMap<String, FeedEntry>,
) -> JobRecord {
    let feed_entry = feed.get(&record.url);

    record.title = record
        .title
        .or(summary.title)
        .or_else(|| feed_entry.and_then(|f| f.title.clone()));
    record.company = record.company.or(summary.company);
    record.location = record.location.or(summary.location);
    record.description = record
        .description
        .or(summary.description)
        .or_else(|| feed_entry.and_then(|f| f.summary.clone()));
    record.posting_date = record
        .posting_date
        .or(summary.posting_date)
        .or_else(|| feed_entry.and_then(|f| f.posting_date));
    record.deadline_date = record.deadline_date.or(summary.deadline_date);
    if record.language_tags.is_empty() {
        record.language_tags = summary.language_tags;
    }

    for (key, value) in summary.extras {
        record.extras.entry(key).or_insert(value);
    }
    if let Some(feed_summary) = feed_entry.and_then(|f| f.summary.clone()) {
        record
            .extras
            .entry("summary".to_string())
            .or_insert(serde_json::Value::String(feed_summary));
    }

    record
}
