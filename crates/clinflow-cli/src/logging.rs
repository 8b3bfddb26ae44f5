//! Log subscriber setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Filter from `RUST_LOG`, falling back to the verbosity default
#[must_use]
pub fn filter_for(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive()))
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
///
/// # Errors
///
/// Returns error if a subscriber is already installed
pub fn init(config: &CliConfig) -> CliResult<()> {
    let layer = if config.log_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(config.color.should_color())
            .boxed()
    };
    tracing_subscriber::registry()
        .with(layer)
        .with(filter_for(config))
        .try_init()
        .map_err(|e| CliError::logging(e.to_string()))
}
