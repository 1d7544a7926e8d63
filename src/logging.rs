//! Tracing subscriber setup driven by [`LoggingConfig`].

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. `format = "pretty"` selects the
/// human-readable layout; anything else logs JSON. Fails if a global subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = filter(config);

    if config.format.eq_ignore_ascii_case("pretty") {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(filter)
            .try_init()
    }
}

fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
