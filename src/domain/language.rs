//! Heuristic language relevance filter.
//!
//! Best-effort by design: a handful of function words per language is enough
//! to keep a Geneva-focused dataset from filling up with German or Italian
//! postings. Misclassifications are acceptable and must never fail a run.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::record::JobRecord;

/// Lowercase alphabetic tokens, French accented letters included.
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zàâçéèêëîïôûùüÿñæœ]{3,}").expect("token regex"));

static FR_HINTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "avec", "pour", "poste", "vous", "nous", "experience", "expérience", "equipe", "équipe",
        "mission", "competences", "compétences", "formation", "travail", "emploi", "profil",
        "francais", "français", "responsable", "gestion", "assurer", "recherche", "candidat",
    ])
});

static EN_HINTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "with", "for", "you", "team", "experience", "job", "position", "skills", "work",
        "english", "required",
    ])
});

static DE_HINTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "mit", "für", "fur", "sie", "erfahrung", "stelle", "aufgaben", "kenntnisse", "arbeit",
        "deutsch",
    ])
});

static IT_HINTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "con", "per", "lavoro", "posizione", "esperienza", "richiesto", "competenze", "squadra",
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    French,
    English,
    German,
    Italian,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::French,
        Language::English,
        Language::German,
        Language::Italian,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::French => "fr",
            Language::English => "en",
            Language::German => "de",
            Language::Italian => "it",
        }
    }

    pub fn from_code(code: &str) -> Option<Language> {
        match code.trim().to_ascii_lowercase().as_str() {
            "fr" => Some(Language::French),
            "en" => Some(Language::English),
            "de" => Some(Language::German),
            "it" => Some(Language::Italian),
            _ => None,
        }
    }

    fn hints(&self) -> &'static HashSet<&'static str> {
        match self {
            Language::French => &FR_HINTS,
            Language::English => &EN_HINTS,
            Language::German => &DE_HINTS,
            Language::Italian => &IT_HINTS,
        }
    }
}

/// Accepts a record when it looks like the target language.
///
/// A source-provided language tag short-circuits the heuristic; otherwise the
/// record passes when the target's hint-word overlap reaches two and no other
/// candidate language scores higher.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceFilter {
    target: Language,
}

impl RelevanceFilter {
    pub fn new(target: Language) -> Self {
        Self { target }
    }

    pub fn accept(&self, record: &JobRecord) -> bool {
        if record
            .language_tags
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(self.target.code()))
        {
            return true;
        }

        let text = format!(
            "{} {}",
            record.title.as_deref().unwrap_or(""),
            record.description.as_deref().unwrap_or("")
        )
        .to_lowercase();
        let tokens: HashSet<&str> = TOKEN_RE.find_iter(&text).map(|m| m.as_str()).collect();

        let overlap = |lang: Language| {
            tokens
                .iter()
                .filter(|token| lang.hints().contains(*token))
                .count()
        };

        let target_score = overlap(self.target);
        target_score >= 2
            && Language::ALL
                .iter()
                .all(|lang| overlap(*lang) <= target_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, description: &str) -> JobRecord {
        let mut r = JobRecord::new("test", "https://example.com/jobs/1");
        r.title = Some(title.to_string());
        r.description = Some(description.to_string());
        r
    }

    #[test]
    fn french_posting_is_accepted() {
        let filter = RelevanceFilter::new(Language::French);
        let r = record(
            "Responsable de mission",
            "Nous recherchons un candidat avec expérience pour ce poste.",
        );
        assert!(filter.accept(&r));
    }

    #[test]
    fn german_dominant_posting_is_rejected() {
        let filter = RelevanceFilter::new(Language::French);
        let r = record(
            "Mitarbeiter",
            "Sie bringen Erfahrung mit, die Stelle umfasst vielfältige Aufgaben und Arbeit.",
        );
        assert!(!filter.accept(&r));
    }

    #[test]
    fn single_hint_is_not_enough() {
        let filter = RelevanceFilter::new(Language::French);
        let r = record("Emploi", "Lorem ipsum dolor sit amet.");
        assert!(!filter.accept(&r));
    }

    #[test]
    fn explicit_tag_overrides_the_heuristic() {
        let filter = RelevanceFilter::new(Language::French);
        let mut r = record("Untitled", "No hint words here at all.");
        r.language_tags = vec!["FR".to_string()];
        assert!(filter.accept(&r));
    }

    #[test]
    fn unknown_codes_map_to_none() {
        assert_eq!(Language::from_code("rm"), None);
        assert_eq!(Language::from_code(" fr "), Some(Language::French));
    }
}
