//! Log filter selection for the service binary.

use mockable::Env;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Build the log filter from `RUST_LOG`, or from the debug flag when unset.
///
/// Debug mode lowers the fallback level to `debug` so the connection summary
/// and per-statement events are emitted without further setup.
pub fn log_filter<E: Env>(env: &E, debug: bool) -> EnvFilter {
    let fallback = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let directives = env.string(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    EnvFilter::builder()
        .with_default_directive(fallback.into())
        .parse_lossy(directives)
}
