//! Merge/dedup rules for reconciling a fresh crawl batch with the persisted
//! dataset.
//!
//! Identity is the canonical URL; the integer id is a stable, monotonically
//! increasing label assigned on first sight of a URL and carried forward on
//! every later update.

use std::collections::HashMap;

use crate::domain::record::JobRecord;

/// Merge `fresh` records into `existing`, keyed by canonical URL.
///
/// - A fresh record whose URL already holds an id keeps that id; its other
///   fields replace the stored ones wholesale.
/// - A fresh record with an unseen URL gets `max assigned id + 1`, in fresh
///   batch order.
/// - Legacy records that never received an integer id are backfilled last, in
///   existing-array order, so the assignment is deterministic across runs.
/// - The result is sorted by id descending (newest assignment first).
///
/// Merging the same fresh batch twice yields an identical result: no new ids,
/// no duplicate URLs.
pub fn merge_by_url(existing: Vec<JobRecord>, fresh: Vec<JobRecord>) -> Vec<JobRecord> {
    let mut max_id = existing.iter().filter_map(|r| r.id).max().unwrap_or(0);

    // Vec + index map keeps insertion order without pulling in an ordered-map
    // dependency; backfill order depends on it.
    let mut order: Vec<String> = Vec::new();
    let mut by_url: HashMap<String, JobRecord> = HashMap::new();

    fn insert(
        record: JobRecord,
        order: &mut Vec<String>,
        by_url: &mut HashMap<String, JobRecord>,
    ) {
        let url = record.url.trim().to_string();
        if url.is_empty() {
            return;
        }
        if !by_url.contains_key(&url) {
            order.push(url.clone());
        }
        by_url.insert(url, record);
    }

    for record in existing {
        insert(record, &mut order, &mut by_url);
    }

    for mut record in fresh {
        let url = record.url.trim().to_string();
        if url.is_empty() {
            continue;
        }
        match by_url.get(&url).and_then(|prior| prior.id) {
            Some(id) => record.id = Some(id),
            None => {
                max_id += 1;
                record.id = Some(max_id);
            }
        }
        insert(record, &mut order, &mut by_url);
    }

    // Backfill ids for legacy rows, existing-array position first.
    for url in &order {
        if let Some(record) = by_url.get_mut(url) {
            if record.id.is_none() {
                max_id += 1;
                record.id = Some(max_id);
            }
        }
    }

    let mut merged: Vec<JobRecord> = order
        .iter()
        .filter_map(|url| by_url.remove(url))
        .collect();
    merged.sort_by(|a, b| b.id.cmp(&a.id));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> JobRecord {
        JobRecord::new("test", url)
    }

    fn record_with_id(url: &str, id: u64) -> JobRecord {
        let mut r = record(url);
        r.id = Some(id);
        r
    }

    #[test]
    fn fresh_records_get_sequential_ids_in_batch_order() {
        let merged = merge_by_url(vec![], vec![record("a"), record("b")]);
        let by_url: HashMap<_, _> = merged.iter().map(|r| (r.url.as_str(), r.id)).collect();
        assert_eq!(by_url["a"], Some(1));
        assert_eq!(by_url["b"], Some(2));
    }

    #[test]
    fn update_keeps_id_and_replaces_fields() {
        let mut old = record_with_id("a", 5);
        old.title = Some("old".to_string());
        let mut fresh = record("a");
        fresh.title = Some("new".to_string());

        let merged = merge_by_url(vec![old], vec![fresh]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, Some(5));
        assert_eq!(merged[0].title.as_deref(), Some("new"));
    }

    #[test]
    fn no_two_records_share_a_url() {
        let merged = merge_by_url(
            vec![record_with_id("a", 1), record_with_id("b", 2)],
            vec![record("a"), record("c"), record("c")],
        );
        let mut urls: Vec<_> = merged.iter().map(|r| r.url.clone()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), merged.len());
    }

    #[test]
    fn merge_is_idempotent() {
        let fresh = vec![record("a"), record("b"), record("c")];
        let once = merge_by_url(vec![], fresh.clone());
        let twice = merge_by_url(once.clone(), fresh);

        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.url, b.url);
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn ids_continue_above_existing_maximum() {
        let merged = merge_by_url(vec![record_with_id("a", 41)], vec![record("b")]);
        let b = merged.iter().find(|r| r.url == "b").unwrap();
        assert_eq!(b.id, Some(42));
    }

    #[test]
    fn legacy_rows_are_backfilled_in_array_order() {
        let merged = merge_by_url(vec![record("x"), record("y")], vec![record("z")]);
        let by_url: HashMap<_, _> = merged.iter().map(|r| (r.url.as_str(), r.id)).collect();
        // Fresh overlay is assigned first (max was 0), backfill follows in
        // existing-array position.
        assert_eq!(by_url["z"], Some(1));
        assert_eq!(by_url["x"], Some(2));
        assert_eq!(by_url["y"], Some(3));
    }

    #[test]
    fn result_is_sorted_by_id_descending() {
        let merged = merge_by_url(
            vec![record_with_id("a", 3), record_with_id("b", 7)],
            vec![record("c")],
        );
        let ids: Vec<_> = merged.iter().map(|r| r.id.unwrap()).collect();
        assert_eq!(ids, vec![8, 7, 3]);
    }

    #[test]
    fn blank_urls_are_dropped() {
        let merged = merge_by_url(vec![record("  ")], vec![record("")]);
        assert!(merged.is_empty());
    }
}
