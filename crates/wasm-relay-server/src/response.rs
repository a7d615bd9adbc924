//! HTTP response conversion for relay results.
//!
//! A [`RelayResponse`] becomes a `200` carrying the module output and the
//! relay's single content-type header. A [`RelayError`] becomes the hosting
//! runtime's generic `500`; the relay itself never produces one.

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use tracing::error;

use wasm_relay_common::RelayError;
use wasm_relay_core::RelayResponse;

/// Body of the runtime's fallback error response.
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// Convert a relay response into an HTTP response.
pub fn into_http(relay_response: RelayResponse) -> Response<Body> {
    let mut response = Response::new(Body::from(relay_response.body));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(RelayResponse::CONTENT_TYPE),
    );
    response
}

/// A relay failure as the hosting runtime reports it.
#[derive(Debug)]
pub struct RuntimeFailure(pub RelayError);

impl IntoResponse for RuntimeFailure {
    fn into_response(self) -> axum::response::Response {
        let err = self.0;
        error!(
            error = %err,
            phase = if err.is_init() { "init" } else { "invoke" },
            resource_limit = err.runtime_error().is_resource_limit(),
            "Relay failed"
        );

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            INTERNAL_ERROR_BODY,
        )
            .into_response()
    }
}

impl From<RelayError> for RuntimeFailure {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}
