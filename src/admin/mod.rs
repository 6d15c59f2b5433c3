//! Administrative endpoint.
//!
//! | Method | Path                     | Action                          |
//! |--------|--------------------------|---------------------------------|
//! | GET    | `/v1/info`               | build identity                  |
//! | POST   | `/MetadataDriver.Config` | swap the forward target         |
//!
//! Other methods on the two fixed paths behave as on any other path.
//! | PUT    | `/{path}`                | update through the pump         |
//! | GET    | `/{path}`                | lookup, same as the service     |

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::config::DaemonConfig;
use crate::http::lookup::lookup;
use crate::http::server::{with_middleware, AppState};
use self::handlers::*;

pub fn setup_admin_router(state: AppState, config: &DaemonConfig) -> Router {
    let router = Router::new()
        .route("/v1/info", get(get_info).put(put_value))
        .route("/MetadataDriver.Config", get(lookup).post(update_config))
        .route("/", get(lookup).put(put_value))
        .route("/{*path}", get(lookup).put(put_value))
        .with_state(state);
    with_middleware(router, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::Forwarder;
    use crate::store::{KeyValueStore, UpdatePump, Value};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Fixture {
        router: Router,
        state: AppState,
        pump: UpdatePump,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(KeyValueStore::new());
        let pump = UpdatePump::spawn(store.clone());
        let state = AppState::new(
            store,
            pump.sender(),
            Forwarder::new("127.0.0.1:1", Duration::from_millis(200)),
        );
        let router = setup_admin_router(state.clone(), &DaemonConfig::default());
        Fixture {
            router,
            state,
            pump,
        }
    }

    async fn call(
        router: &Router,
        method: Method,
        path: &str,
        body: impl Into<Body>,
    ) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(body.into())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn info_reports_identity() {
        let f = fixture();
        let (status, body) = call(&f.router, Method::GET, "/v1/info", "").await;
        assert_eq!(status, StatusCode::OK);
        let info: PluginInfo = serde_json::from_slice(&body).unwrap();
        assert_eq!(info.kind, PLUGIN_TYPE);
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn put_json_object_merges_keys() {
        let f = fixture();
        let (status, _) = call(
            &f.router,
            Method::PUT,
            "/ignored",
            r#"{"region":"us-west-2","tags":{"team":"infra"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(f.state.store.get("ignored"), None);

        let (status, body) = call(&f.router, Method::GET, "/region", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"us-west-2");

        let (_, body) = call(&f.router, Method::GET, "/tags", "").await;
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc, serde_json::json!({"team": "infra"}));
    }

    #[tokio::test]
    async fn put_raw_body_is_stored_under_path() {
        let f = fixture();
        let (status, _) = call(&f.router, Method::PUT, "/latest/user-data", "#!/bin/bash\necho hi").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            f.state.store.get("latest/user-data"),
            Some(Value::from("#!/bin/bash\necho hi"))
        );
    }

    #[tokio::test]
    async fn binary_body_round_trips() {
        let f = fixture();
        let payload = vec![0xff, 0xfe, 0x61, 0x00, 0xc3];
        let (status, _) = call(&f.router, Method::PUT, "/blob", payload.clone()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&f.router, Method::GET, "/blob", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, payload);
    }

    #[tokio::test]
    async fn fixed_routes_fall_back_to_the_store_for_other_methods() {
        let f = fixture();
        let (status, _) = call(&f.router, Method::PUT, "/v1/info", "custom").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(f.state.store.get("v1/info"), Some(Value::from("custom")));

        // A miss forwards to the unreachable upstream instead of 405.
        let (status, _) = call(&f.router, Method::GET, "/MetadataDriver.Config", "").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _) = call(&f.router, Method::PUT, "/", r#"{"MetadataDriver.Config":"x"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&f.router, Method::GET, "/MetadataDriver.Config", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"x");
    }

    #[tokio::test]
    async fn put_after_pump_stops_is_rejected() {
        let f = fixture();
        f.pump.stop();
        f.pump.wait().await;
        let (status, _) = call(&f.router, Method::PUT, "/a", "b").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn config_update_swaps_target() {
        let f = fixture();
        let (status, _) = call(
            &f.router,
            Method::POST,
            "/MetadataDriver.Config",
            r#"{"forward_hostport":"10.0.0.1:8080"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(f.state.forwarder.target().get(), "10.0.0.1:8080");

        let (status, _) = call(&f.router, Method::POST, "/MetadataDriver.Config", "not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = call(
            &f.router,
            Method::POST,
            "/MetadataDriver.Config",
            r#"{"forward_hostport":""}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(f.state.forwarder.target().get(), "10.0.0.1:8080");
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let f = fixture();
        let request = Request::get("/v1/info").body(Body::empty()).unwrap();
        let response = f.router.clone().oneshot(request).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn miss_without_upstream_is_bad_gateway() {
        let f = fixture();
        let (status, _) = call(&f.router, Method::GET, "/latest/meta-data/ami-id", "").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
