//! File-backed persistence for the dataset and the incremental crawl state.
//!
//! Both files are whole-file rewrites of pretty-printed JSON. Loads are
//! forgiving: a missing or corrupt file is an empty dataset, never a crash.
//! Writes are the opposite: an unwritable output path is a hard error the
//! operator has to see.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::record::JobRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted incremental state, co-located with the dataset.
///
/// `seen_urls` is the superset of every URL any run has ever discovered for
/// this dataset; it only grows, independently of date-window filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlState {
    pub last_run_at: Option<DateTime<Utc>>,
    pub seen_urls: Vec<String>,
    pub output_json: Option<String>,
    /// Source-specific run context (canton, language, search location, ...).
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

/// Storage seam for the engine; the crawl logic never touches paths or files
/// directly, so locking or a transactional backend can land here without
/// touching the engine.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn load_records(&self) -> Vec<JobRecord>;
    async fn save_records(&self, records: &[JobRecord]) -> Result<(), StorageError>;
    async fn load_state(&self) -> CrawlState;
    async fn save_state(&self, state: &CrawlState) -> Result<(), StorageError>;
    fn dataset_path(&self) -> &Path;
    fn state_path(&self) -> &Path;
}

/// JSON files on disk. The state file name is derived from the dataset path:
/// `professions.json` sits next to `professions.state.json`.
pub struct JsonFileStore {
    dataset_path: PathBuf,
    state_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dataset_path: impl Into<PathBuf>) -> Self {
        let dataset_path = dataset_path.into();
        let state_path = state_path_for(&dataset_path);
        Self {
            dataset_path,
            state_path,
        }
    }

    async fn write_pretty<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|source| StorageError::Write {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        let mut content = serde_json::to_string_pretty(value).map_err(|source| {
            StorageError::Serialize {
                path: path.display().to_string(),
                source,
            }
        })?;
        content.push('\n');
        fs::write(path, content).await.map_err(|source| StorageError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Derive the co-located state file path from the dataset path.
pub fn state_path_for(dataset_path: &Path) -> PathBuf {
    let stem = dataset_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    dataset_path.with_file_name(format!("{stem}.state.json"))
}

#[async_trait]
impl DatasetStore for JsonFileStore {
    async fn load_records(&self) -> Vec<JobRecord> {
        let content = match fs::read_to_string(&self.dataset_path).await {
            Ok(content) => content,
            Err(_) => {
                debug!(path = %self.dataset_path.display(), "no existing dataset");
                return Vec::new();
            }
        };
        let values: Vec<Value> = match serde_json::from_str(&content) {
            Ok(Value::Array(values)) => values,
            Ok(_) | Err(_) => {
                warn!(path = %self.dataset_path.display(), "corrupt dataset file, treating as empty");
                return Vec::new();
            }
        };
        values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<JobRecord>(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(path = %self.dataset_path.display(), error = %err, "skipping unreadable record");
                    None
                }
            })
            .collect()
    }

    async fn save_records(&self, records: &[JobRecord]) -> Result<(), StorageError> {
        self.write_pretty(&self.dataset_path, &records).await
    }

    async fn load_state(&self) -> CrawlState {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(_) => return CrawlState::default(),
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                warn!(path = %self.state_path.display(), error = %err, "corrupt state file, starting fresh");
                CrawlState::default()
            }
        }
    }

    async fn save_state(&self, state: &CrawlState) -> Result<(), StorageError> {
        self.write_pretty(&self.state_path, state).await
    }

    fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    fn state_path(&self) -> &Path {
        &self.state_path
    }
}
