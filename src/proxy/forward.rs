//! Request forwarding to the upstream metadata service.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the current forward target
//! - Strip hop-by-hop headers in both directions
//! - Stream the upstream response back unchanged
//! - Map transport failures to 502 Bad Gateway

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::observability::metrics;
use crate::proxy::target::ForwardTarget;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards lookup misses to the current target.
pub struct Forwarder {
    target: ForwardTarget,
    client: Client<HttpConnector, Body>,
}

impl Forwarder {
    pub fn new(target: impl Into<String>, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            target: ForwardTarget::new(target),
            client,
        }
    }

    pub fn target(&self) -> &ForwardTarget {
        &self.target
    }

    /// Send `request` to the forward target and relay the response.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let target = self.target.get();
        let (parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri: Uri = match format!("http://{}{}", target, path_and_query).parse() {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(target = %target, error = %e, "Invalid forward URI");
                return (StatusCode::BAD_GATEWAY, "Invalid forward target").into_response();
            }
        };

        tracing::debug!(target = %target, path = %path_and_query, "Forwarding lookup");

        let mut upstream = Request::builder().method(parts.method).uri(uri);
        if let Some(headers) = upstream.headers_mut() {
            copy_end_to_end(&parts.headers, headers);
            if let Ok(host) = HeaderValue::from_str(&target) {
                headers.insert(header::HOST, host);
            }
        }
        let upstream = match upstream.body(body) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build upstream request");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        match self.client.request(upstream).await {
            Ok(response) => {
                let status = response.status();
                metrics::record_forward(status.as_u16(), start);
                let (mut parts, body) = response.into_parts();
                let mut headers = HeaderMap::with_capacity(parts.headers.len());
                copy_end_to_end(&parts.headers, &mut headers);
                parts.headers = headers;
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(target = %target, error = %e, "Upstream error");
                metrics::record_forward(StatusCode::BAD_GATEWAY.as_u16(), start);
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}

/// Copy headers except hop-by-hop ones and any named in `Connection`.
fn copy_end_to_end(from: &HeaderMap, to: &mut HeaderMap) {
    let listed: Vec<HeaderName> = from
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for (name, value) in from.iter() {
        if HOP_BY_HOP.contains(&name.as_str()) || listed.contains(name) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hop_by_hop_headers() {
        let mut from = HeaderMap::new();
        from.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        from.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        from.insert("x-session", HeaderValue::from_static("abc"));
        from.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        from.insert("x-aws-ec2-metadata-token", HeaderValue::from_static("tok"));
        from.append(header::ACCEPT, HeaderValue::from_static("text/plain"));
        from.append(header::ACCEPT, HeaderValue::from_static("application/json"));

        let mut to = HeaderMap::new();
        copy_end_to_end(&from, &mut to);

        assert!(to.get(header::CONNECTION).is_none());
        assert!(to.get("keep-alive").is_none());
        assert!(to.get("x-session").is_none());
        assert!(to.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(to.get("x-aws-ec2-metadata-token").unwrap(), "tok");
        assert_eq!(to.get_all(header::ACCEPT).iter().count(), 2);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let forwarder = Forwarder::new(format!("127.0.0.1:{}", port), Duration::from_secs(1));

        let request = Request::get("/latest/meta-data/").body(Body::empty()).unwrap();
        let response = forwarder.forward(request).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
