//! Pagination controller: drives sequential fetch-and-extract over the
//! result pages of one source and owns the stop-crawling policy.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::adapters::{FetchError, PageFetcher, SourceAdapter};
use crate::domain::record::ListingSummary;
use crate::infrastructure::config::{LimitsConfig, SearchConfig};

/// Upper bound on pages scanned when the source reports no total and no
/// explicit maximum is configured.
const DYNAMIC_PAGE_CAP: u32 = 200;

/// Why a crawl stopped. Every variant is a safe stop: whatever was collected
/// up to that point is kept and the run proceeds to merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page yielded no listings, or the reported last page was reached.
    EndOfResults,
    /// The configured number of consecutive already-known URLs was hit.
    KnownStreak,
    /// The configured page maximum (or the dynamic cap) was reached.
    PageLimit,
    /// Enough newly-unseen URLs were discovered to satisfy the detail limit.
    DetailLimit,
    /// The source-reported total result count was covered.
    TotalCount,
    /// Transport-level fetch failure.
    FetchFailed,
    /// Rate-limit or access-denial response.
    Blocked,
    /// The adapter failed on structurally broken page content.
    ParseFailed,
}

/// Result of one discovery pass: summaries in discovery order, deduplicated
/// by first occurrence.
#[derive(Debug)]
pub struct Discovery {
    pub summaries: Vec<ListingSummary>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

enum Phase {
    Fetching(u32),
    Extracting { page: u32, body: String },
    Stopped(StopReason),
}

pub struct PaginationController<'a> {
    adapter: &'a dyn SourceAdapter,
    fetcher: &'a dyn PageFetcher,
    search: &'a SearchConfig,
    limits: &'a LimitsConfig,
    request_delay: Duration,
    /// URLs already present in the dataset or the persisted seen-set.
    known: &'a HashSet<String>,
}

impl<'a> PaginationController<'a> {
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        fetcher: &'a dyn PageFetcher,
        search: &'a SearchConfig,
        limits: &'a LimitsConfig,
        request_delay: Duration,
        known: &'a HashSet<String>,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            search,
            limits,
            request_delay,
            known,
        }
    }

    pub async fn run(&self) -> Discovery {
        let streak_threshold = (self.limits.stop_after_seen > 0).then_some(self.limits.stop_after_seen);
        let detail_limit =
            (self.limits.max_detail_fetches > 0).then_some(self.limits.max_detail_fetches as usize);
        let page_cap = if self.limits.max_pages > 0 {
            self.limits.max_pages
        } else {
            DYNAMIC_PAGE_CAP
        };

        let mut summaries: Vec<ListingSummary> = Vec::new();
        let mut seen_this_run: HashSet<String> = HashSet::new();
        let mut known_streak = 0u32;
        let mut new_count = 0usize;
        let mut total_pages_hint: Option<u32> = None;
        let mut total_count_hint: Option<u64> = None;
        let mut pages_fetched = 0u32;

        let mut phase = Phase::Fetching(1);
        let stop = loop {
            phase = match phase {
                Phase::Fetching(page) => {
                    if page > 1 && !self.request_delay.is_zero() {
                        tokio::time::sleep(self.request_delay).await;
                    }
                    let request = if page == 1 {
                        self.adapter.search_request(self.search)
                    } else {
                        self.adapter.page_request(self.search, page)
                    };
                    match self.fetcher.fetch(&request).await {
                        Ok(fetched) => {
                            pages_fetched += 1;
                            Phase::Extracting {
                                page,
                                body: fetched.body,
                            }
                        }
                        Err(err @ FetchError::Blocked { .. }) => {
                            warn!(page, error = %err, "blocked while fetching search page, stopping safely");
                            Phase::Stopped(StopReason::Blocked)
                        }
                        Err(err) => {
                            warn!(page, error = %err, "search page fetch failed, stopping safely");
                            Phase::Stopped(StopReason::FetchFailed)
                        }
                    }
                }

                Phase::Extracting { page, body } => 'extract: {
                    let listing = match self.adapter.extract_listing_page(&body) {
                        Ok(listing) => listing,
                        Err(err) => {
                            // Loud on purpose: an adapter that cannot read the
                            // page at all is not the same as "no more results".
                            error!(page, error = %err, "listing extraction failed, stopping safely");
                            break 'extract Phase::Stopped(StopReason::ParseFailed);
                        }
                    };

                    if page == 1 {
                        total_pages_hint = listing.total_pages;
                        if let Some(total) = total_pages_hint {
                            info!(total_pages = total, "source reported page count");
                        }
                    }
                    if total_count_hint.is_none() {
                        total_count_hint = listing.total_count;
                    }

                    if listing.summaries.is_empty() {
                        debug!(page, "no listings extracted, end of results");
                        break 'extract Phase::Stopped(StopReason::EndOfResults);
                    }
                    debug!(page, links = listing.summaries.len(), "extracted listing links");

                    let mut streak_stop = false;
                    for summary in listing.summaries {
                        if !seen_this_run.insert(summary.url.clone()) {
                            continue;
                        }
                        let is_known = self.known.contains(&summary.url);
                        if !is_known {
                            new_count += 1;
                        }
                        summaries.push(summary);

                        if let Some(threshold) = streak_threshold {
                            if is_known {
                                known_streak += 1;
                                if known_streak >= threshold {
                                    // Mid-page stop: listings are reverse
                                    // chronological, everything deeper is
                                    // almost certainly stale.
                                    info!(streak = known_streak, "known-URL streak reached, stopping");
                                    streak_stop = true;
                                    break;
                                }
                            } else {
                                known_streak = 0;
                            }
                        }
                    }

                    if streak_stop {
                        Phase::Stopped(StopReason::KnownStreak)
                    } else if detail_limit.is_some_and(|limit| new_count >= limit) {
                        Phase::Stopped(StopReason::DetailLimit)
                    } else if total_pages_hint.is_some_and(|total| page >= total) {
                        Phase::Stopped(StopReason::EndOfResults)
                    } else if self.total_count_covered(page, total_count_hint) {
                        Phase::Stopped(StopReason::TotalCount)
                    } else if page >= page_cap {
                        Phase::Stopped(StopReason::PageLimit)
                    } else {
                        Phase::Fetching(page + 1)
                    }
                }

                Phase::Stopped(reason) => break reason,
            };
        };

        info!(
            links = summaries.len(),
            new = new_count,
            pages = pages_fetched,
            stop = ?stop,
            "discovery finished"
        );
        Discovery {
            summaries,
            pages_fetched,
            stop,
        }
    }

    fn total_count_covered(&self, page: u32, total_count: Option<u64>) -> bool {
        match (total_count, self.adapter.page_size()) {
            (Some(total), Some(size)) => u64::from(page) * u64::from(size) >= total,
            _ => false,
        }
    }
}
