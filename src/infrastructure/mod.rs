//! Infrastructure: HTTP, configuration, logging, persistence and export.

pub mod config;
pub mod export;
pub mod http_client;
pub mod logging;
pub mod storage;

pub use config::{AppConfig, ConfigManager};
pub use http_client::{HttpClient, HttpClientConfig};
pub use storage::{CrawlState, DatasetStore, JsonFileStore};
