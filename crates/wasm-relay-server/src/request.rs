//! HTTP request conversion for the relay.
//!
//! Turns the parts axum hands a handler into the [`RelayRequest`] the
//! module receives.

use axum::http::header::HOST;
use axum::http::request::Parts;
use bytes::Bytes;

use wasm_relay_core::RelayRequest;

/// Host used when the request carries neither an absolute URI nor a `Host`
/// header.
const FALLBACK_HOST: &str = "localhost";

/// Build a [`RelayRequest`] from request parts and the collected body.
///
/// Header values are kept as raw bytes. The URL is made absolute from the
/// `Host` header when the request line only had a path.
pub fn from_parts(parts: &Parts, body: Bytes) -> RelayRequest {
    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
        .collect();

    RelayRequest {
        method: parts.method.to_string(),
        url: absolute_url(parts),
        headers,
        body: (!body.is_empty()).then(|| body.to_vec()),
    }
}

fn absolute_url(parts: &Parts) -> String {
    let uri = &parts.uri;
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string();
    }

    let host = parts
        .headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or(FALLBACK_HOST);
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());

    format!("http://{host}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method, Request};

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_from_parts() {
        let parts = parts(
            Request::builder()
                .method(Method::POST)
                .uri("/move?turn=3")
                .header("Host", "snake.example.com")
                .header("Content-Type", "application/json")
                .body(())
                .unwrap(),
        );

        let req = from_parts(&parts, Bytes::from(r#"{"turn":3}"#));

        assert_eq!(req.method, "POST");
        assert_eq!(req.url, "http://snake.example.com/move?turn=3");
        assert_eq!(
            req.headers,
            vec![
                ("host".to_string(), b"snake.example.com".to_vec()),
                ("content-type".to_string(), b"application/json".to_vec()),
            ]
        );
        assert_eq!(req.body.as_deref(), Some(br#"{"turn":3}"#.as_slice()));
    }

    #[test]
    fn test_empty_body_is_none() {
        let parts = parts(Request::builder().uri("/").body(()).unwrap());
        let req = from_parts(&parts, Bytes::new());

        assert_eq!(req.method, "GET");
        assert_eq!(req.url, "http://localhost/");
        assert!(req.body.is_none());
    }

    #[test]
    fn test_absolute_uri_kept() {
        let parts = parts(
            Request::builder()
                .uri("http://proxy.example.com:8080/start")
                .header("Host", "ignored.example.com")
                .body(())
                .unwrap(),
        );

        assert_eq!(
            from_parts(&parts, Bytes::new()).url,
            "http://proxy.example.com:8080/start"
        );
    }

    #[test]
    fn test_non_ascii_header_values_kept() {
        let mut parts = parts(Request::builder().uri("/").body(()).unwrap());
        parts.headers.insert(
            "x-name",
            HeaderValue::from_bytes("café".as_bytes()).unwrap(),
        );
        parts
            .headers
            .insert("x-binary", HeaderValue::from_bytes(&[0x80, 0x81]).unwrap());

        let req = from_parts(&parts, Bytes::new());
        assert_eq!(
            req.headers,
            vec![
                ("x-name".to_string(), "café".as_bytes().to_vec()),
                ("x-binary".to_string(), vec![0x80, 0x81]),
            ]
        );

        let envelope: serde_json::Value =
            serde_json::from_slice(&req.to_envelope().unwrap()).unwrap();
        assert_eq!(
            envelope["headers"],
            serde_json::json!([["x-name", "café"], ["x-binary", {"base64": "gIE="}]])
        );
    }
}
