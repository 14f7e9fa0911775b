use std::fmt::Write as _;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::warn;

use crate::errors::{Result, StepError};

/// Immutable snapshot of the last response: status, headers and the whole
/// body read into memory.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    status: u16,
    headers: HeaderMap,
    body: String,
}

impl CapturedResponse {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<String>) -> Self {
        CapturedResponse {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Drain `response` into a snapshot.
    pub(crate) async fn capture(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(StepError::BodyRead)?;
        let body = String::from_utf8_lossy(&bytes).into_owned();
        Ok(CapturedResponse {
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// First value of header `name`, or an empty string when absent.
    pub fn header(&self, name: &str) -> String {
        let Some(value) = self.headers.get(name) else {
            return String::new();
        };
        match value.to_str() {
            Ok(v) => v.to_string(),
            Err(_) => {
                warn!(header = name, "response header is not valid UTF-8");
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            }
        }
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).map_err(StepError::InvalidJson)
    }

    /// Wire-style rendering for debug output.
    pub fn dump(&self) -> String {
        let reason = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown");
        let mut out = format!("HTTP/1.1 {} {reason}\n", self.status);
        for (name, value) in &self.headers {
            let _ = writeln!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
        }
        let _ = write!(out, "\n{}", self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};

    fn response() -> CapturedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-some-header", HeaderValue::from_static("hello"));
        CapturedResponse::new(201, headers, r#"{"id":1}"#)
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let r = response();
        assert_eq!(r.header("X-Some-Header"), "hello");
        assert_eq!(r.header("x-some-header"), "hello");
    }

    #[test]
    fn missing_header_reads_empty() {
        assert_eq!(response().header("non-existing-header"), "");
        assert_eq!(response().header("not a header name"), "");
    }

    #[test]
    fn json_body() {
        assert_eq!(response().json().unwrap(), serde_json::json!({"id": 1}));
        let text = CapturedResponse::new(200, HeaderMap::new(), "hello");
        assert!(matches!(text.json(), Err(StepError::InvalidJson(_))));
    }

    #[test]
    fn dump_contains_status_headers_and_body() {
        let dump = response().dump();
        assert!(dump.starts_with("HTTP/1.1 201 Created\n"));
        assert!(dump.contains("x-some-header: hello\n"));
        assert!(dump.ends_with("\n\n{\"id\":1}"));
    }
}
