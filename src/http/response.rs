//! Response handling and transformation.
//!
//! # Responsibilities
//! - Hold fully buffered responses that can be cached and cloned per tier
//! - Strip hop-by-hop headers from upstream responses
//! - Convert buffered responses back into Axum responses
//! - Build the 500 response that carries failure detail in debug headers
//!
//! # Design Decisions
//! - Bodies are buffered: every cacheable response is written to two tiers
//! - Header maps are replaced, never shared, when a stage rewrites them

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::http::headers::{X_DEBUG_ERROR, X_DEBUG_ERROR_STACK};

/// A response whose body has been read into memory.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Header value as text, if present and visible ASCII.
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Rebuild the response with a new header set, keeping status and body.
    pub fn with_headers(self, headers: HeaderMap) -> Self {
        Self { headers, ..self }
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

/// Set a header from text, skipping values that are not valid header bytes.
pub fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => {
            tracing::warn!(header = %name, "Dropping header with invalid value");
        }
    }
}

/// Build the 500 response for a failed request.
///
/// The message and the error chain travel in debug headers; the body is the
/// same chain as a plain-text trace, one cause per line.
pub fn failure_response(error: &(dyn std::error::Error + 'static)) -> Response {
    let mut stack = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        stack.push(cause.to_string());
        source = cause.source();
    }

    let mut headers = HeaderMap::new();
    set_header(&mut headers, X_DEBUG_ERROR, &error.to_string());
    set_header(&mut headers, X_DEBUG_ERROR_STACK, &stack.join(" <- "));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    BufferedResponse::new(StatusCode::INTERNAL_SERVER_ERROR, headers, stack.join("\n"))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn test_failure_response_carries_chain_in_headers() {
        let error = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let response = failure_response(&error);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[&X_DEBUG_ERROR], "outer failure");
        assert_eq!(
            response.headers()[&X_DEBUG_ERROR_STACK],
            "outer failure <- disk gone"
        );
    }
}
