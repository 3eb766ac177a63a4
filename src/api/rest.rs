//! REST API Handlers
//!
//! Implements the dashboard datasource endpoints: connectivity check,
//! table query, distinct-value search, metrics, and optional debug vars.
//!
//! Every failure is reported as a bare 500; the cause is only logged.

use super::codec::{decode_predicates, JsonCodecRef, SerdeJsonCodec};
use crate::discovery::SharedSettings;
use crate::domain::ports::VolumeInfoGetterRef;
use crate::error::Error;
use crate::query::{filter_volumes, project_distinct, project_table};
use crate::telemetry::DiscoveryMetrics;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Content type of every JSON response
const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

// =============================================================================
// Response Types
// =============================================================================

/// Debug snapshot returned by `/debug/vars`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugVarsResponse {
    pub version: String,
    pub driver_names: Vec<String>,
    pub storage_system_keys: Vec<String>,
    pub discoveries: u64,
    pub discovery_failures: u64,
    pub last_volume_count: i64,
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    finder: VolumeInfoGetterRef,
    settings: Arc<SharedSettings>,
    metrics: Arc<DiscoveryMetrics>,
    codec: JsonCodecRef,
    enable_debug: bool,
}

impl RestRouter {
    /// Create a new REST router using the `serde_json` codec
    pub fn new(
        finder: VolumeInfoGetterRef,
        settings: Arc<SharedSettings>,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Self {
        Self {
            finder,
            settings,
            metrics,
            codec: Arc::new(SerdeJsonCodec),
            enable_debug: false,
        }
    }

    /// Replace the request/response codec
    pub fn with_codec(mut self, codec: JsonCodecRef) -> Self {
        self.codec = codec;
        self
    }

    /// Expose `/debug/vars`
    pub fn with_debug(mut self, enable_debug: bool) -> Self {
        self.enable_debug = enable_debug;
        self
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        debug!("setting up routes");
        let state = AppState {
            finder: self.finder,
            settings: self.settings,
            metrics: self.metrics,
            codec: self.codec,
        };

        let mut router = Router::new()
            .route("/", get(root))
            .route("/query", post(query))
            .route("/topology.json", get(query).post(query))
            .route("/search", post(search))
            .route("/metrics", get(metrics))
            .route("/health", get(health_check));

        if self.enable_debug {
            router = router.route("/debug/vars", get(debug_vars));
        }

        router.layer(TraceLayer::new_for_http()).with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    finder: VolumeInfoGetterRef,
    settings: Arc<SharedSettings>,
    metrics: Arc<DiscoveryMetrics>,
    codec: JsonCodecRef,
}

// =============================================================================
// Handlers
// =============================================================================

/// Datasource connectivity check
async fn root() -> StatusCode {
    StatusCode::OK
}

/// Table query
async fn query(State(state): State<AppState>, method: Method, uri: Uri, body: Bytes) -> Response {
    debug!(uri = %uri, method = %method, "handling request");

    let volumes = match state.finder.get_persistent_volumes().await {
        Ok(volumes) => volumes,
        Err(e) => return server_error(&e, "getting persistent volumes"),
    };
    debug!(volumes = volumes.len(), "volumefinder returned persistent volumes");

    let request = match state.codec.decode_query(&body) {
        Ok(request) => request.unwrap_or_default(),
        Err(e) => return server_error(&e, "decoding body"),
    };

    let predicates = match decode_predicates(state.codec.as_ref(), &request) {
        Ok(predicates) => predicates,
        Err(e) => return server_error(&e, "unmarshalling target"),
    };

    let table = project_table(filter_volumes(&volumes, &predicates));
    debug!(rows = table.rows.len(), "generating table response");

    match state.codec.encode_tables(&[table]) {
        Ok(body) => json_response(body),
        Err(e) => server_error(&e, "marshalling table response"),
    }
}

/// Distinct values of one field
async fn search(State(state): State<AppState>, method: Method, uri: Uri, body: Bytes) -> Response {
    debug!(uri = %uri, method = %method, "handling request");

    let volumes = match state.finder.get_persistent_volumes().await {
        Ok(volumes) => volumes,
        Err(e) => return server_error(&e, "getting persistent volumes"),
    };

    let values = match state.codec.decode_search(&body) {
        Ok(Some(request)) => project_distinct(&volumes, &request.target),
        Ok(None) => Vec::new(),
        Err(e) => return server_error(&e, "decoding body"),
    };
    debug!(values = values.len(), "generating search response");

    match state.codec.encode_values(&values) {
        Ok(body) => json_response(body),
        Err(e) => server_error(&e, "marshalling search response"),
    }
}

/// Prometheus exposition
async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            text,
        )
            .into_response(),
        Err(e) => server_error(&e, "encoding metrics"),
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Runtime snapshot for debugging
async fn debug_vars(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.settings.snapshot();
    Json(DebugVarsResponse {
        version: crate::VERSION.to_string(),
        driver_names: settings.drivers.names().to_vec(),
        storage_system_keys: settings.storage_system_keys.clone(),
        discoveries: state.metrics.discoveries(),
        discovery_failures: state.metrics.failures(),
        last_volume_count: state.metrics.last_volume_count(),
    })
}

// =============================================================================
// Utility Functions
// =============================================================================

fn json_response(body: Vec<u8>) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
}

fn server_error(e: &Error, context: &str) -> Response {
    error!(error = %e, kind = %e.kind(), "{}", context);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
