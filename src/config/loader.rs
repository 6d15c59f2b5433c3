//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::DaemonConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::net::ListenAddr;
use crate::observability::logging::MAX_VERBOSITY;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a TOML file without validating it, so callers can layer overrides first.
pub fn read_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub admin: Option<ListenAddr>,
    pub service: Option<ListenAddr>,
    pub forward: Option<String>,
    /// Clamped into 0..=5.
    pub log_level: Option<i64>,
    pub json_logs: bool,
}

impl Overrides {
    pub fn apply(self, config: &mut DaemonConfig) {
        if let Some(addr) = self.admin {
            config.admin.address = addr;
        }
        if let Some(addr) = self.service {
            config.service.address = addr;
        }
        if let Some(forward) = self.forward {
            config.forward.host_port = forward;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level.clamp(0, MAX_VERBOSITY);
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
    }
}

/// Defaults, then the optional file, then `overrides`; validated last.
pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<DaemonConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => DaemonConfig::default(),
    };
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
