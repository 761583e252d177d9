use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default subscriber (INFO unless `RUST_LOG` says otherwise).
pub fn init() {
    initialize_tracing(LevelFilter::INFO);
}

/// Install the subscriber with a different default level, e.g. DEBUG for `--verbose`.
pub fn init_with_level(level: LevelFilter) {
    initialize_tracing(level);
}

/// Initialize tracing subscriber with default configuration.
///
/// Logs go to stderr so command output on stdout stays machine readable.
/// `RUST_LOG_FORMAT=json` switches to one JSON object per line.
fn initialize_tracing(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(log_layer).try_init().is_err() {
        warn!("Tracing subscriber was already installed, keeping the existing one");
    }
}
