//! The request value handed to the relayed module.
//!
//! The relay never inspects a [`RelayRequest`]. The Wasm entry point
//! receives it as a JSON envelope:
//!
//! ```json
//! {"method":"POST","url":"http://localhost/move","headers":[["content-type","application/json"]],"body":"{}"}
//! ```
//!
//! A body that is not UTF-8 travels as `body_base64` instead of `body`.
//! Likewise a header value that is not UTF-8 is sent as
//! `["name", {"base64": "..."}]` instead of `["name", "value"]`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use wasm_relay_common::RuntimeError;

/// An inbound HTTP request, as passed to the module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Absolute request URL
    pub url: String,
    /// Request headers in arrival order, values as received
    pub headers: Vec<(String, Vec<u8>)>,
    /// Request body, `None` when empty
    pub body: Option<Vec<u8>>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    method: &'a str,
    url: &'a str,
    headers: Vec<(&'a str, EnvelopeValue<'a>)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_base64: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EnvelopeValue<'a> {
    Text(&'a str),
    Binary { base64: String },
}

impl<'a> EnvelopeValue<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(_) => Self::Binary {
                base64: STANDARD.encode(bytes),
            },
        }
    }
}

impl RelayRequest {
    /// Create a new request without headers or body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body; an empty body is stored as `None`.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    /// Serialize the request into the envelope written into guest memory.
    pub fn to_envelope(&self) -> Result<Vec<u8>, RuntimeError> {
        let (body, body_base64) = match self.body.as_deref() {
            None => (None, None),
            Some(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => (Some(text), None),
                Err(_) => (None, Some(STANDARD.encode(bytes))),
            },
        };

        let envelope = Envelope {
            method: &self.method,
            url: &self.url,
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.as_str(), EnvelopeValue::new(value)))
                .collect(),
            body,
            body_base64,
        };

        serde_json::to_vec(&envelope)
            .map_err(|e| RuntimeError::guest_abi(format!("Failed to encode request: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn envelope_json(req: &RelayRequest) -> Value {
        serde_json::from_slice(&req.to_envelope().unwrap()).unwrap()
    }

    #[test]
    fn test_envelope_without_body() {
        let req = RelayRequest::new("GET", "http://localhost/");

        assert_eq!(
            envelope_json(&req),
            json!({"method": "GET", "url": "http://localhost/", "headers": []})
        );
    }

    #[test]
    fn test_envelope_with_text_body() {
        let req = RelayRequest::new("POST", "http://localhost/move")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"turn":3}"#);

        let value = envelope_json(&req);
        assert_eq!(value["headers"], json!([["Content-Type", "application/json"]]));
        assert_eq!(value["body"], json!(r#"{"turn":3}"#));
        assert!(value.get("body_base64").is_none());
    }

    #[test]
    fn test_envelope_with_binary_body() {
        let req = RelayRequest::new("PUT", "http://localhost/blob").with_body(vec![0xff, 0x00, 0xfe]);

        let value = envelope_json(&req);
        assert!(value.get("body").is_none());
        assert_eq!(value["body_base64"], json!("/wD+"));
    }

    #[test]
    fn test_envelope_header_values() {
        let req = RelayRequest::new("GET", "http://localhost/")
            .with_header("x-name", "café")
            .with_header("x-raw", vec![0xff, 0xfe]);

        assert_eq!(
            envelope_json(&req)["headers"],
            json!([["x-name", "café"], ["x-raw", {"base64": "//4="}]])
        );
    }

    #[test]
    fn test_empty_body_is_none() {
        let req = RelayRequest::new("POST", "http://localhost/").with_body(Vec::new());
        assert!(req.body.is_none());
    }
}
