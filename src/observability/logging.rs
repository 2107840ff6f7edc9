//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once, at process start
//! - Map `--verbose` / `--silent` onto a filter
//! - Let `RUST_LOG` override both

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool, silent: bool) -> &'static str {
    if silent {
        "off"
    } else if verbose {
        "capture_proxy=debug,tower_http=debug"
    } else {
        "capture_proxy=info,tower_http=warn"
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(verbose: bool, silent: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, silent)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
