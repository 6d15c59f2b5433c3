//! Top-level daemon error.

use crate::config::ConfigError;
use crate::lifecycle::shutdown::ShutdownError;
use crate::net::listener::ListenerError;
use crate::proxy::TargetError;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid forward target: {0}")]
    Target(#[from] TargetError),

    #[error("{endpoint} listener: {source}")]
    Listener {
        endpoint: &'static str,
        #[source]
        source: ListenerError,
    },

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}
