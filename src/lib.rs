//! job-harvest: incremental crawl-and-merge engine for job-posting listings.
//!
//! A site-agnostic controller paginates search results, fetches only unseen
//! detail pages, normalizes heterogeneous extraction output into one record
//! shape and merges it into a stable, id-addressable dataset that survives
//! runs separated by hours or months. Per-site knowledge lives in small
//! adapters behind a fixed capability set.

pub mod adapters;
pub mod application;
pub mod domain;
pub mod infrastructure;
