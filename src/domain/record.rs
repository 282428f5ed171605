//! Core record types shared by the engine and the source adapters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted job posting, keyed by its canonical detail-page URL.
///
/// Every field except `source` and `url` is optional: adapters degrade to
/// `None` on missing markup instead of failing, and legacy datasets may
/// predate any given field. The integer `id` is assigned by the merge step
/// and never reassigned afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "lenient_date")]
    pub posting_date: Option<NaiveDate>,
    #[serde(default, with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub deadline_date: Option<NaiveDate>,
    /// Language ISO codes reported by the source itself, when it has them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language_tags: Vec<String>,
    /// Source-specific structured fields (workload, pay class, canton, ...).
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl JobRecord {
    pub fn new(source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            url: url.into(),
            title: None,
            company: None,
            location: None,
            description: None,
            posting_date: None,
            deadline_date: None,
            language_tags: Vec::new(),
            extras: Map::new(),
        }
    }
}

/// Ephemeral listing-card data collected while scanning a result page.
///
/// Never persisted on its own; it seeds a [`JobRecord`] when the detail page
/// is missing a field, or stands in for the whole record on sources whose
/// listing API is authoritative.
#[derive(Debug, Clone, Default)]
pub struct ListingSummary {
    pub url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub posting_date: Option<NaiveDate>,
    pub deadline_date: Option<NaiveDate>,
    pub language_tags: Vec<String>,
    pub extras: Map<String, Value>,
}

impl ListingSummary {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Build a full record out of the card data alone.
    pub fn into_record(self, source: &str) -> JobRecord {
        JobRecord {
            id: None,
            source: source.to_string(),
            url: self.url,
            title: self.title,
            company: self.company,
            location: self.location,
            description: self.description,
            posting_date: self.posting_date,
            deadline_date: self.deadline_date,
            language_tags: self.language_tags,
            extras: self.extras,
        }
    }
}

/// One extracted search-result page: summaries in page order plus whatever
/// pagination metadata the source's own markup or API reported.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub summaries: Vec<ListingSummary>,
    pub total_pages: Option<u32>,
    pub total_count: Option<u64>,
}

impl ListingPage {
    pub fn from_summaries(summaries: Vec<ListingSummary>) -> Self {
        Self {
            summaries,
            total_pages: None,
            total_count: None,
        }
    }
}

/// ISO-date serde that treats unparsable persisted values as absent instead
/// of failing the whole dataset load.
pub mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_lenient))
    }

    /// Accepts `YYYY-MM-DD`, optionally with a trailing `T...` timestamp part.
    pub fn parse_lenient(raw: &str) -> Option<NaiveDate> {
        let date_part = raw.trim().split('T').next()?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }
}
