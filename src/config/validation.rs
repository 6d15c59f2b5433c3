//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntax, including listen addresses)
//! - Check value ranges (timeouts > 0, verbosity within 0..=5)
//! - Detect both endpoints bound to the same address
//!
//! Returns every error found, not just the first.

use std::net::SocketAddr;

use crate::config::schema::DaemonConfig;
use crate::observability::logging::MAX_VERBOSITY;
use crate::proxy::validate_target;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.admin.address == config.service.address {
        errors.push(ValidationError::new(
            "service.address",
            format!("same as admin address {}", config.admin.address),
        ));
    }

    if let Err(e) = validate_target(&config.forward.host_port) {
        errors.push(ValidationError::new("forward.host_port", e.to_string()));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    let level = config.observability.log_level;
    if !(0..=MAX_VERBOSITY).contains(&level) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("{} is outside 0..={}", level, MAX_VERBOSITY),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
