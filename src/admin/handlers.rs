use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::lookup::key_for_path;
use crate::http::server::AppState;
use crate::proxy::validate_target;
use crate::store::{PendingUpdate, PumpError};

/// Plugin type reported by the info endpoint.
pub const PLUGIN_TYPE: &str = "docker.metadataDriver/1.0";

/// Build identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub namespace: String,
    pub version: String,
    pub revision: String,
}

impl PluginInfo {
    /// Identity of this build. Name, namespace and revision can be stamped at
    /// compile time through `PLUGIN_NAME`, `PLUGIN_NAMESPACE` and `BUILD_REVISION`.
    pub fn current() -> Self {
        Self {
            name: option_env!("PLUGIN_NAME")
                .unwrap_or(env!("CARGO_PKG_NAME"))
                .to_string(),
            kind: PLUGIN_TYPE.to_string(),
            namespace: option_env!("PLUGIN_NAMESPACE")
                .unwrap_or("metadata")
                .to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            revision: option_env!("BUILD_REVISION")
                .unwrap_or("Unspecified")
                .to_string(),
        }
    }
}

/// Body of a forward reconfiguration request.
#[derive(Debug, Deserialize, Serialize)]
pub struct ForwardConfigRequest {
    #[serde(default)]
    pub forward_hostport: String,
}

pub async fn get_info() -> Json<PluginInfo> {
    tracing::info!("Request for info");
    Json(PluginInfo::current())
}

/// Swap the forward target.
pub async fn update_config(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let config: ForwardConfigRequest = match serde_json::from_slice(&body) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable config update");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if let Err(e) = validate_target(&config.forward_hostport) {
        tracing::warn!(error = %e, "Rejected config update");
        return StatusCode::BAD_REQUEST;
    }

    let previous = state.forwarder.target().set(config.forward_hostport.clone());
    tracing::info!(
        previous = %previous,
        target = %config.forward_hostport,
        "Forward target updated"
    );
    StatusCode::OK
}

/// Push a value (or a JSON object of values) through the update pump.
pub async fn put_value(State(state): State<AppState>, uri: Uri, body: Bytes) -> StatusCode {
    let key = key_for_path(uri.path());
    tracing::info!(key = %key, bytes = body.len(), "Update requested");

    match state.updates.send(PendingUpdate::from_body(key, body)).await {
        Ok(()) => {
            tracing::info!(key = %key, "Dispatched update");
            StatusCode::OK
        }
        Err(PumpError::Stopped) => {
            tracing::warn!(key = %key, "Cannot update, pump stopped");
            StatusCode::METHOD_NOT_ALLOWED
        }
    }
}
