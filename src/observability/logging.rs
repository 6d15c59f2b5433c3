//! Structured logging.
//!
//! Verbosity is an integer from 0 (least verbose) to 5, clamped. `RUST_LOG`
//! takes precedence when set.

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Highest accepted verbosity.
pub const MAX_VERBOSITY: i64 = 5;

/// Map a numeric verbosity to a tracing level.
///
/// 0 through 2 only report errors; 3 adds warnings, 4 info, 5 debug.
pub fn level_for(verbosity: i64) -> Level {
    match verbosity.clamp(0, MAX_VERBOSITY) {
        0..=2 => Level::ERROR,
        3 => Level::WARN,
        4 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Initialize the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(
    verbosity: i64,
    json: bool,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let level = level_for(verbosity).as_str().to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("metadata_proxy={level},tower_http={level}").into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    }
}
