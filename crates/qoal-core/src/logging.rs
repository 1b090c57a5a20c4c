//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global `tracing` subscriber.
///
/// Reads `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Calling this more
/// than once returns an error instead of panicking.
pub fn init() -> Result<()> {
    init_with_filter(DEFAULT_FILTER)
}

/// Install the global `tracing` subscriber with a custom fallback filter.
pub fn init_with_filter(fallback: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_thread_names(true)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
