//! Key-path lookup.
//!
//! A request path (minus its leading `/`) is the key. Hits are served from
//! the store; misses are forwarded to the current target.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::store::Value;

/// The store key for a request path.
pub fn key_for_path(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Serve a lookup from the store, or forward it.
pub async fn lookup(State(state): State<AppState>, request: Request<Body>) -> Response {
    let key = key_for_path(request.uri().path()).to_string();

    if let Some(value) = state.store.get(&key) {
        tracing::info!(request_id = %request_id(&request), key = %key, "Lookup hit");
        metrics::record_lookup("hit");
        return render(&value);
    }

    metrics::record_lookup("miss");
    tracing::info!(
        request_id = %request_id(&request),
        key = %key,
        target = %state.forwarder.target().get(),
        "Lookup miss, forwarding"
    );
    state.forwarder.forward(request).await
}

fn render(value: &Value) -> Response {
    let content_type = match value {
        Value::Text(_) => "text/plain; charset=utf-8",
        Value::Document(_) => "application/json",
        Value::Bytes(_) => "application/octet-stream",
    };
    match value.to_body() {
        Ok(body) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode stored value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_drops_one_leading_slash() {
        assert_eq!(key_for_path("/region"), "region");
        assert_eq!(key_for_path("/latest/meta-data/instance-id"), "latest/meta-data/instance-id");
        assert_eq!(key_for_path("/"), "");
        assert_eq!(key_for_path("//double"), "/double");
    }
}
