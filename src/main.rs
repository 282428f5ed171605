//! Binary entry point: `job-harvest <source> [config.json]`.
//!
//! The source name selects an adapter; everything else comes from the
//! configuration file (all options have defaults, so the file is optional).

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use job_harvest::adapters;
use job_harvest::application::CrawlEngine;
use job_harvest::infrastructure::config::{resolve_output_path, ConfigManager};
use job_harvest::infrastructure::logging::init_logging;
use job_harvest::infrastructure::{AppConfig, HttpClient, HttpClientConfig, JsonFileStore};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(source) = args.next() else {
        eprintln!("usage: job-harvest <jobup|talent|ge|jobroom> [config.json]");
        anyhow::bail!("missing source argument");
    };

    let config = match args.next() {
        Some(path) => ConfigManager::new(path).load_config().await?,
        None => AppConfig::default(),
    };

    let adapter = adapters::by_name(&source, &config.search)
        .with_context(|| format!("unknown source '{source}'"))?;
    let fetcher = HttpClient::new(HttpClientConfig::from(&config.http))?;
    let store = JsonFileStore::new(resolve_output_path(&config.output, adapter.source_id()));

    let engine = CrawlEngine::new(adapter.as_ref(), &fetcher, &store, &config);
    let summary = engine.run().await?;

    info!(
        source = %summary.source,
        pages = summary.pages_fetched,
        stop = ?summary.stop,
        links = summary.links_discovered,
        fresh = summary.fresh_records,
        written = summary.records_written,
        seen = summary.seen_urls,
        "run complete"
    );
    Ok(())
}
