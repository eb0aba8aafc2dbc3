//! HTTP facade - the synchronous API end users call.
//!
//! Each endpoint builds a Core request, sends it through the [`RpcClient`]
//! and answers with the Core's reply. Every path is also served under the
//! legacy `/coreInterface/v1` prefix.

pub mod params;
pub mod response;

use crate::bridge::{ListenerStatus, RpcClient};
use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use params::QueryParams;
use response::{bad_security_headers, core_reply, envelope};
use shared_types::{
    CoreSparqlQueryRequest, ResourceUrlsRequest, SecurityHeaderError, SecurityRequest,
    SparqlQueryRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Prefix of the deprecated route set.
pub const LEGACY_URI_PREFIX: &str = "/coreInterface/v1";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    client: Arc<RpcClient>,
    listener: ListenerStatus,
}

impl AppState {
    pub fn new(client: Arc<RpcClient>, listener: ListenerStatus) -> Self {
        Self { client, listener }
    }
}

/// Build the facade router.
pub fn router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive());

    let mut router = Router::new().route("/health", get(health_check));
    for prefix in ["", LEGACY_URI_PREFIX] {
        router = router
            .route(&format!("{prefix}/query"), get(query))
            .route(&format!("{prefix}/sparqlQuery"), post(sparql_query))
            .route(&format!("{prefix}/resourceUrls"), get(resource_urls));
    }

    router.layer(middleware).with_state(state)
}

/// Collect the `x-auth-*` headers into a security envelope.
///
/// Header names are matched case-insensitively; repeated headers keep their
/// first value.
pub fn security_request(headers: &HeaderMap) -> Result<SecurityRequest, SecurityHeaderError> {
    let mut single = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            single
                .entry(name.as_str().to_ascii_lowercase())
                .or_insert_with(|| value.to_string());
        }
    }
    SecurityRequest::from_headers(&single)
}

/// Attribute-based resource search.
async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Response {
    let security = match security_request(&headers) {
        Ok(security) => security,
        Err(err) => return bad_security_headers(&err),
    };

    let request = match QueryParams::parse(raw.as_deref()).to_core_query(security) {
        Ok(request) => request,
        Err(err) => return envelope(StatusCode::BAD_REQUEST, err.to_string()),
    };

    debug!(?request, "Forwarding search query");
    core_reply(state.client.send(&request).await)
}

/// SPARQL resource search.
async fn sparql_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(query): Json<SparqlQueryRequest>,
) -> Response {
    let security = match security_request(&headers) {
        Ok(security) => security,
        Err(err) => return bad_security_headers(&err),
    };

    let request = CoreSparqlQueryRequest::from_user_query(query, security);
    core_reply(state.client.send(&request).await)
}

/// Interworking Interface URLs of the resources named by `id`.
async fn resource_urls(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Response {
    let security = match security_request(&headers) {
        Ok(security) => security,
        Err(err) => return bad_security_headers(&err),
    };

    let ids = QueryParams::parse(raw.as_deref()).resource_ids();
    if ids.is_empty() {
        return envelope(
            StatusCode::BAD_REQUEST,
            "Required query parameter 'id' is not present",
        );
    }

    let request = ResourceUrlsRequest::new(ids, Some(security));
    core_reply(state.client.send(&request).await)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let listening = state.listener.is_running();
    let (status, health) = if listening {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(serde_json::json!({
            "status": health,
            "service": "core-interface",
            "version": env!("CARGO_PKG_VERSION"),
            "replyListener": listening,
            "replyQueue": state.client.reply_to(),
            "registry": state.client.registry().snapshot(),
        })),
    )
}
