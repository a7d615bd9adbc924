//! HTTP router configuration.

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{health_check, relay_request};
use crate::state::AppState;

/// Build the application router.
///
/// Every method and path goes to the relay, except `health_path` when one
/// is given.
pub fn build_router(
    state: AppState,
    request_timeout: Duration,
    health_path: Option<&str>,
) -> Router {
    let mut router = Router::new();

    if let Some(path) = health_path {
        router = router.route(path, get(health_check));
    }

    router
        .fallback(relay_request)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{Method, Request, StatusCode};
    use tower::util::ServiceExt;
    use wasm_relay_common::{EngineConfig, RuntimeConfig};
    use wasm_relay_core::ModuleSource;

    const ECHO_WAT: &str = r#"
        (module
            (memory (export "memory") 1)
            (func (export "alloc") (param i32) (result i32) (i32.const 1024))
            (func (export "run") (param i32 i32) (result i64)
                (i64.or
                    (i64.shl (i64.extend_i32_u (local.get 0)) (i64.const 32))
                    (i64.extend_i32_u (local.get 1)))
            )
        )
    "#;

    const TRAP_WAT: &str = r#"
        (module
            (memory (export "memory") 1)
            (func (export "alloc") (param i32) (result i32) (i32.const 1024))
            (func (export "run") (param i32 i32) (result i64) unreachable)
        )
    "#;

    fn state(wat: &str) -> AppState {
        let config = RuntimeConfig {
            engine: EngineConfig {
                pooling_allocator: false,
                epoch_interruption: false,
                ..Default::default()
            },
            ..Default::default()
        };
        AppState::with_source(&config, ModuleSource::Wat(wat.to_string())).unwrap()
    }

    fn router(wat: &str, health_path: Option<&str>) -> Router {
        build_router(state(wat), Duration::from_secs(30), health_path)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_any_path_is_relayed() {
        let app = router(ECHO_WAT, None);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/move")
                    .header("Host", "snake.local")
                    .body(Body::from(r#"{"turn":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "application/json;charset=UTF-8"
        );

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["method"], "POST");
        assert_eq!(body["url"], "http://snake.local/move");
        assert_eq!(body["body"], r#"{"turn":1}"#);
    }

    #[tokio::test]
    async fn test_health_path_is_relayed_when_disabled() {
        let app = router(ECHO_WAT, None);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_string(response).await;
        assert!(body.contains(r#""url":"http://localhost/health""#));
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = router(ECHO_WAT, Some("/_relay/health"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/_relay/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["module_initialized"], false);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let app = build_router(
            state(ECHO_WAT).with_max_body_bytes(16),
            Duration::from_secs(30),
            None,
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/move")
                    .body(Body::from(vec![b'x'; 17]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_body_at_limit_is_relayed() {
        let app = build_router(
            state(ECHO_WAT).with_max_body_bytes(16),
            Duration::from_secs(30),
            None,
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/move")
                    .body(Body::from(vec![b'x'; 16]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_module_failure_is_500() {
        let app = router(TRAP_WAT, None);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Internal Server Error");
    }
}
