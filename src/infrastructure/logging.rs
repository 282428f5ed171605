//! Logging initialization.
//!
//! Console output through tracing-subscriber, filterable with the standard
//! `RUST_LOG` environment variable.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with an env-filter; defaults to `info` for this crate
/// and `warn` for dependencies when `RUST_LOG` is unset.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,job_harvest=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
