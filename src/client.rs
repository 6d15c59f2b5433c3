//! Minimal HTTP client for the admin endpoint.
//!
//! The admin endpoint usually listens on a Unix-domain socket, which the
//! usual HTTP clients do not speak, so requests go over a single hyper
//! HTTP/1 connection opened per call.

use axum::http::{header, Method, Request, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};

use crate::net::{AddressError, ListenAddr};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("request failed: {0}")]
    Send(#[from] hyper::Error),
}

/// Status and body of an admin response.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ClientResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Client for one admin endpoint.
#[derive(Debug, Clone)]
pub struct AdminClient {
    addr: ListenAddr,
}

impl AdminClient {
    pub fn new(addr: ListenAddr) -> Self {
        Self { addr }
    }

    /// Parse `unix:///path` or `tcp://host:port`.
    pub fn from_url(url: &str) -> Result<Self, ClientError> {
        Ok(Self::new(url.parse()?))
    }

    pub async fn info(&self) -> Result<ClientResponse, ClientError> {
        self.request(Method::GET, "/v1/info", Bytes::new()).await
    }

    pub async fn get(&self, path: &str) -> Result<ClientResponse, ClientError> {
        self.request(Method::GET, &normalize(path), Bytes::new()).await
    }

    pub async fn put(&self, path: &str, value: impl Into<Bytes>) -> Result<ClientResponse, ClientError> {
        self.request(Method::PUT, &normalize(path), value.into()).await
    }

    /// Point lookup misses at a new upstream.
    pub async fn set_forward(&self, host_port: &str) -> Result<ClientResponse, ClientError> {
        let body = serde_json::json!({ "forward_hostport": host_port }).to_string();
        self.request(Method::POST, "/MetadataDriver.Config", Bytes::from(body))
            .await
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
    ) -> Result<ClientResponse, ClientError> {
        let connect_err = |source| ClientError::Connect {
            addr: self.addr.to_string(),
            source,
        };
        let (host, response) = match &self.addr {
            ListenAddr::Tcp(host_port) => {
                let stream = TcpStream::connect(host_port.as_str())
                    .await
                    .map_err(connect_err)?;
                (host_port.as_str(), send(stream, host_port, method, path, body).await?)
            }
            ListenAddr::Unix(socket) => {
                let stream = UnixStream::connect(socket).await.map_err(connect_err)?;
                ("localhost", send(stream, "localhost", method, path, body).await?)
            }
        };
        tracing::debug!(host, path, status = %response.status, "Admin response");
        Ok(response)
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

async fn send<S>(
    stream: S,
    host: &str,
    method: Method,
    path: &str,
    body: Bytes,
) -> Result<ClientResponse, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "Admin connection closed with error");
        }
    });

    let request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, host)
        .body(Full::new(body))?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok(ClientResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_gain_a_leading_slash() {
        assert_eq!(normalize("region"), "/region");
        assert_eq!(normalize("/region"), "/region");
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(matches!(
            AdminClient::from_url("http://localhost"),
            Err(ClientError::Address(_))
        ));
    }
}
