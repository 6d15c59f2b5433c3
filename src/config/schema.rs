//! Configuration schema definitions.
//!
//! Every section has defaults so an empty file (or no file) yields a
//! working daemon.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::net::ListenAddr;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Administrative endpoint (info, reconfiguration, updates).
    pub admin: ListenerConfig,

    /// Read-only lookup endpoint.
    pub service: ListenerConfig,

    /// Upstream that receives lookup misses.
    pub forward: ForwardConfig,

    pub timeouts: TimeoutConfig,

    pub limits: LimitConfig,

    pub observability: ObservabilityConfig,

    pub pid: PidConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            admin: ListenerConfig::admin(),
            service: ListenerConfig::service(),
            forward: ForwardConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitConfig::default(),
            observability: ObservabilityConfig::default(),
            pid: PidConfig::default(),
        }
    }
}

/// One listening endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenerConfig {
    /// `unix:///path` or `tcp://host:port`.
    pub address: ListenAddr,
}

pub const DEFAULT_ADMIN_ADDRESS: &str = "unix:///run/docker/plugins/metadata.sock";
pub const DEFAULT_SERVICE_ADDRESS: &str = "tcp://:3131";
pub const DEFAULT_FORWARD_TARGET: &str = "169.254.169.254:80";

impl ListenerConfig {
    /// `DEFAULT_ADMIN_ADDRESS` as a listen address.
    pub fn admin() -> Self {
        let path = DEFAULT_ADMIN_ADDRESS.trim_start_matches("unix://");
        Self {
            address: ListenAddr::Unix(PathBuf::from(path)),
        }
    }

    /// `DEFAULT_SERVICE_ADDRESS` as a listen address, bound on all interfaces.
    pub fn service() -> Self {
        let port = DEFAULT_SERVICE_ADDRESS.trim_start_matches("tcp://");
        Self {
            address: ListenAddr::Tcp(format!("0.0.0.0{}", port)),
        }
    }
}

/// Forwarding for lookup misses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Upstream `host:port`.
    pub host_port: String,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            host_port: DEFAULT_FORWARD_TARGET.to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection timeout in seconds.
    pub connect_secs: u64,

    /// Whole-request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Verbosity 0 (errors only) to 5 (debug).
    pub log_level: i64,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Serve a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: 4,
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9131".to_string(),
        }
    }
}

/// PID file placement.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PidConfig {
    pub enabled: bool,

    /// Directory that receives `<exe>.pid`.
    pub dir: PathBuf,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("."),
        }
    }
}
