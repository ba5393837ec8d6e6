// Tracing initialisation for the CLI.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// * `default_level` -- directive used when `RUST_LOG` is not set
///   (e.g. `"info"` or `"vmfleet_cli=debug"`).
/// * `json` -- emit structured JSON lines instead of the human-readable format.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(default_level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = result;
}
