//! Shared tracing/logging initialization.
//!
//! Both `dgbridge` and `dgbridge-ruletester` set up `tracing_subscriber`
//! the same way: an env-filter plus optional JSON output. Logs go to stderr
//! so stdout stays free for tool output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"dgbridge_daemon=info,dgbridge_core=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Build the default filter string for a binary crate at the given level.
///
/// The core library is always included so rule-loading diagnostics show up.
pub fn default_filter(crate_name: &str, level: &str) -> String {
    format!("{crate_name}={level},dgbridge_core={level}")
}
