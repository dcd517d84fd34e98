//! Logging configuration using tracing

use crate::error::{Error, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing subscriber
///
/// Filtering follows `RUST_LOG` (default `info`), output goes to stderr.
/// `verbose` raises this crate to `debug` on top of the filter.
///
/// # Errors
/// Returns an error if a subscriber has already been installed
pub fn init(verbose: bool) -> Result<()> {
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if verbose && let Ok(directive) = "mergeclock=debug".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Internal(format!("failed to initialize tracing: {e}")))
}
