//! Listen address parsing.
//!
//! Addresses use a URL-like form: `tcp://host:port` or `unix:///path/to.sock`.
//! An empty TCP host (`tcp://:3131`) binds all interfaces.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Error returned for malformed listen addresses.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("unsupported listen scheme in '{0}' (expected tcp:// or unix://)")]
    UnsupportedScheme(String),
    #[error("invalid tcp address '{addr}': {reason}")]
    InvalidTcp { addr: String, reason: String },
    #[error("unix listen address '{0}' has an empty path")]
    EmptyPath(String),
}

/// Where a listener binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ListenAddr {
    /// `host:port` for a TCP listener.
    Tcp(String),
    /// Filesystem path of a Unix-domain socket.
    Unix(PathBuf),
}

impl ListenAddr {
    /// Build a TCP address from `host:port`.
    pub fn tcp(host_port: &str) -> Result<Self, AddressError> {
        format!("tcp://{}", host_port).parse()
    }

    pub fn protocol(&self) -> &'static str {
        match self {
            ListenAddr::Tcp(_) => "tcp",
            ListenAddr::Unix(_) => "unix",
        }
    }
}

impl FromStr for ListenAddr {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(AddressError::EmptyPath(s.to_string()));
            }
            return Ok(ListenAddr::Unix(PathBuf::from(path)));
        }

        let Some(rest) = s.strip_prefix("tcp://") else {
            return Err(AddressError::UnsupportedScheme(s.to_string()));
        };

        let invalid = |reason: String| AddressError::InvalidTcp {
            addr: s.to_string(),
            reason,
        };

        let rest = if rest.starts_with(':') {
            format!("0.0.0.0{}", rest)
        } else {
            rest.to_string()
        };

        let url = Url::parse(&format!("tcp://{}", rest)).map_err(|e| invalid(e.to_string()))?;
        if url.path() != "" && url.path() != "/" {
            return Err(invalid("unexpected path".to_string()));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let port = url.port().ok_or_else(|| invalid("missing port".to_string()))?;

        Ok(ListenAddr::Tcp(format!("{}:{}", host, port)))
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "tcp://{}", addr),
            ListenAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl TryFrom<String> for ListenAddr {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ListenAddr> for String {
    fn from(addr: ListenAddr) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_paths() {
        let addr: ListenAddr = "unix:///run/docker/plugins/metadata.sock".parse().unwrap();
        assert_eq!(
            addr,
            ListenAddr::Unix(PathBuf::from("/run/docker/plugins/metadata.sock"))
        );
        assert_eq!(addr.protocol(), "unix");
        assert_eq!(addr.to_string(), "unix:///run/docker/plugins/metadata.sock");
    }

    #[test]
    fn parses_tcp_addresses() {
        assert_eq!(
            "tcp://127.0.0.1:3131".parse::<ListenAddr>().unwrap(),
            ListenAddr::Tcp("127.0.0.1:3131".into())
        );
        assert_eq!(
            "tcp://:3131".parse::<ListenAddr>().unwrap(),
            ListenAddr::Tcp("0.0.0.0:3131".into())
        );
        assert_eq!(
            ListenAddr::tcp("localhost:80").unwrap(),
            ListenAddr::Tcp("localhost:80".into())
        );
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(matches!(
            "http://localhost:80".parse::<ListenAddr>(),
            Err(AddressError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            "unix://".parse::<ListenAddr>(),
            Err(AddressError::EmptyPath(_))
        ));
        assert!(matches!(
            "tcp://localhost".parse::<ListenAddr>(),
            Err(AddressError::InvalidTcp { .. })
        ));
        assert!(matches!(
            "tcp://localhost:99999".parse::<ListenAddr>(),
            Err(AddressError::InvalidTcp { .. })
        ));
    }
}
