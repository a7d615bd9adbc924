//! Request handlers.
//!
//! [`relay_request`] is the fallback for every method and path; it hands
//! the request to the relay and waits for the module's answer.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{debug, info, instrument, warn};

use crate::request::from_parts;
use crate::response::{RuntimeFailure, into_http};
use crate::state::AppState;

/// Relay any request to the module.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn relay_request(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let limit = state.max_body_bytes();
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(limit, "Request body too large");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    let relay_request = from_parts(&parts, body);
    debug!(
        headers = relay_request.headers.len(),
        body_bytes = relay_request.body.as_ref().map_or(0, Vec::len),
        "Relaying request"
    );

    let pending = Arc::clone(state.relay()).respond(relay_request);

    match pending.await {
        Ok(response) => {
            info!(
                duration_ms = start.elapsed().as_millis(),
                body_bytes = response.body.len(),
                "Request relayed"
            );
            into_http(response)
        }
        Err(e) => RuntimeFailure(e).into_response(),
    }
}

/// Health check handler.
///
/// Reports whether the module has been initialized yet; never triggers
/// initialization itself.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "module_initialized": state.relay().is_initialized(),
    });

    (StatusCode::OK, axum::Json(body))
}
