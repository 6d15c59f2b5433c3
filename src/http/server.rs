//! HTTP server setup.
//!
//! # Responsibilities
//! - Hold the state shared by every handler
//! - Build the read-only service router
//! - Wire up middleware (request ID, tracing, timeout, body limit)

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, routing::get, Router};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::DaemonConfig;
use crate::http::lookup::lookup;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::proxy::Forwarder;
use crate::store::{KeyValueStore, UpdateSender};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<KeyValueStore>,
    pub updates: UpdateSender,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    pub fn new(store: Arc<KeyValueStore>, updates: UpdateSender, forwarder: Forwarder) -> Self {
        Self {
            store,
            updates,
            forwarder: Arc::new(forwarder),
        }
    }
}

/// Router for the read-only service endpoint.
pub fn service_router(state: AppState, config: &DaemonConfig) -> Router {
    let router = Router::new()
        .route("/", get(lookup))
        .route("/{*path}", get(lookup))
        .with_state(state);
    with_middleware(router, config)
}

/// Apply the common middleware stack.
#[allow(deprecated)]
pub fn with_middleware(router: Router, config: &DaemonConfig) -> Router {
    router
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request),
                )
            }),
        )
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}
