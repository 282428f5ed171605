//! Run configuration: loading, saving and defaults.
//!
//! One JSON file per source describes a complete run. Every option has a
//! default, so a missing file is not an error; a malformed file is (silently
//! crawling with half a configuration would be worse than stopping).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::info;

/// Default values shared by the config structs below.
pub mod defaults {
    pub const LOCATION: &str = "Genève";
    pub const MAX_PAGES: u32 = 0; // 0 = dynamic, capped by the controller
    pub const MAX_DETAIL_FETCHES: u32 = 0; // 0 = unlimited
    pub const WINDOW_DAYS: u32 = 30; // 0 = no date window
    pub const STOP_AFTER_SEEN: u32 = 120; // 0 = disabled
    pub const REQUEST_DELAY_MS: u64 = 200;
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;
    pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
    pub const ACCEPT_LANGUAGE: &str = "fr-CH,fr;q=0.9,en;q=0.8";
    pub const TARGET_LANGUAGE: &str = "fr";
}

/// Complete configuration for one source run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub limits: LimitsConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
    pub filter: FilterConfig,
}

/// What to search for. `url`, when set, is used verbatim as the page-1
/// request and overrides location/term. `extra` carries source-specific
/// parameters (jobroom radius/lang, ge domain filter, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub location: String,
    pub term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            location: defaults::LOCATION.to_string(),
            term: String::new(),
            url: None,
            extra: Map::new(),
        }
    }
}

impl SearchConfig {
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }
}

/// Crawl stop limits. A value of 0 disables the corresponding limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_pages: u32,
    pub max_detail_fetches: u32,
    pub window_days: u32,
    pub stop_after_seen: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pages: defaults::MAX_PAGES,
            max_detail_fetches: defaults::MAX_DETAIL_FETCHES,
            window_days: defaults::WINDOW_DAYS,
            stop_after_seen: defaults::STOP_AFTER_SEEN,
        }
    }
}

/// HTTP client behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    /// Politeness pause between consecutive requests within a run.
    pub request_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            accept_language: defaults::ACCEPT_LANGUAGE.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            request_delay_ms: defaults::REQUEST_DELAY_MS,
        }
    }
}

/// Where the merged dataset lands. An empty path resolves to
/// `data/<source>/professions.json` at run time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub json_path: String,
    pub save_csv: bool,
}

/// Relevance filter toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub language_filter: bool,
    pub target_language: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            language_filter: false,
            target_language: defaults::TARGET_LANGUAGE.to_string(),
        }
    }
}

/// Loads and saves the JSON configuration file.
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load configuration, falling back to defaults when the file does not
    /// exist. A present-but-malformed file is a hard error.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(path = %self.config_path.display(), "no configuration file, using defaults");
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("failed to read config file {}", self.config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("malformed config file {}", self.config_path.display()))
    }

    /// Write the configuration back out, creating parent directories.
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create config directory {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(config).context("failed to serialize config")?;
        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("failed to write config file {}", self.config_path.display()))
    }
}

/// Resolve the dataset path for a source, applying the default layout when
/// the configured path is empty.
pub fn resolve_output_path(output: &OutputConfig, source_id: &str) -> PathBuf {
    if output.json_path.trim().is_empty() {
        Path::new("data").join(source_id).join("professions.json")
    } else {
        PathBuf::from(output.json_path.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.limits.window_days, 30);
        assert_eq!(config.limits.stop_after_seen, 120);
        assert!(!config.filter.language_filter);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"limits": {"max_pages": 3}}"#).unwrap();
        assert_eq!(config.limits.max_pages, 3);
        assert_eq!(config.limits.window_days, 30);
        assert_eq!(config.search.location, "Genève");
    }

    #[test]
    fn search_extras_are_reachable() {
        let config: AppConfig = serde_json::from_str(
            r#"{"search": {"location": "GE", "radius": 30, "lang": "fr"}}"#,
        )
        .unwrap();
        assert_eq!(config.search.extra_u64("radius"), Some(30));
        assert_eq!(config.search.extra_str("lang"), Some("fr"));
    }

    #[test]
    fn empty_output_path_uses_source_layout() {
        let path = resolve_output_path(&OutputConfig::default(), "jobup");
        assert_eq!(path, Path::new("data/jobup/professions.json"));
    }
}
