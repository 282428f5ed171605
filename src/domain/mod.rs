//! Domain model and pure rules for the crawl-and-merge engine.
//!
//! Everything in this module is side-effect free: record shapes, the
//! merge/dedup rules, the date-window predicate and the relevance filter.
//! Network and persistence live in `infrastructure`.

pub mod language;
pub mod merge;
pub mod record;
pub mod window;

pub use language::{Language, RelevanceFilter};
pub use merge::merge_by_url;
pub use record::{JobRecord, ListingPage, ListingSummary};
pub use window::DateWindow;
