//! Logging setup for the command-line tool.
//!
//! Filtered by `RUST_LOG` (default `warn`) and written to stderr, so stdout
//! stays clean for `--json` output. The library itself only emits events and
//! never installs a subscriber.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Calling it twice is harmless; the second
/// call reports the error and keeps the first subscriber.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();

    if let Err(e) = result {
        eprintln!("warning: logging already initialized: {e}");
    }
}
