//! Forward target cell.

use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use axum::http::uri::Authority;

/// Error for a malformed `host:port` target.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("forward target is empty")]
    Empty,
    #[error("invalid forward target '{target}': {reason}")]
    Invalid { target: String, reason: String },
}

/// Check that `target` is a bare `host[:port]` authority.
pub fn validate_target(target: &str) -> Result<(), TargetError> {
    if target.trim().is_empty() {
        return Err(TargetError::Empty);
    }
    let invalid = |reason: &str| TargetError::Invalid {
        target: target.to_string(),
        reason: reason.to_string(),
    };
    if target.contains(['/', '?', '#']) {
        return Err(invalid("expected host:port without a path"));
    }
    if target.contains('@') {
        return Err(invalid("credentials are not allowed"));
    }
    let authority = Authority::from_str(target).map_err(|e| invalid(&e.to_string()))?;
    let has_port = authority.as_str().len() > authority.host().len();
    if has_port && authority.port_u16().is_none() {
        return Err(invalid("invalid port"));
    }
    Ok(())
}

/// The upstream `host:port` that lookup misses are forwarded to.
///
/// Read on every miss, replaced by admin reconfiguration. The lock makes the
/// swap atomic for readers.
#[derive(Debug)]
pub struct ForwardTarget {
    host_port: RwLock<String>,
}

impl ForwardTarget {
    pub fn new(host_port: impl Into<String>) -> Self {
        Self {
            host_port: RwLock::new(host_port.into()),
        }
    }

    /// Current target.
    pub fn get(&self) -> String {
        self.host_port
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the target, returning the previous one.
    pub fn set(&self, host_port: impl Into<String>) -> String {
        let mut guard = self.host_port.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, host_port.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_returns_previous() {
        let target = ForwardTarget::new("169.254.169.254:80");
        assert_eq!(target.set("127.0.0.1:8080"), "169.254.169.254:80");
        assert_eq!(target.get(), "127.0.0.1:8080");
    }

    #[test]
    fn validation() {
        assert!(validate_target("169.254.169.254:80").is_ok());
        assert!(validate_target("metadata.internal").is_ok());
        assert_eq!(validate_target(""), Err(TargetError::Empty));
        assert!(validate_target("user:pw@host:80").is_err());
        assert!(validate_target("host:port").is_err());
        assert!(validate_target("host/path").is_err());
    }
}
