use tracing_subscriber::{fmt, EnvFilter};

/// Request spans from `TraceLayer` are emitted at debug level.
const DEFAULT_FILTER: &str = "info,tower_http=debug";

/// Initializes tracing/logging based on environment variables.
///
/// `RUST_LOG` replaces the default filter; `LOG_FORMAT=json` switches to
/// structured JSON lines.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false);

    let json_output = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_output {
        builder.json().init();
    } else {
        builder.init();
    }
}
