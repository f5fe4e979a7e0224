//! Transparent HTTP forwarding to the upstream backend.
//!
//! # Responsibilities
//! - Relay any verb and path to the upstream endpoint verbatim
//! - Strip headers the transport layer must own (host, content-length
//!   upstream; transfer-encoding, connection downstream)
//! - Translate connection refusal into the deterministic degraded 503
//!
//! # Design Decisions
//! - One upstream attempt per inbound request; retries are the caller's
//!   business
//! - Timeouts and protocol errors share the generic 502 path; only
//!   connection refusal is special-cased
//! - Empty request bodies are forwarded as no body at all

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::http::server::AppState;

/// Body of the degraded response, preserved verbatim for clients that
/// match on it.
const BACKEND_STARTING: &str = "Backend starting...";

/// Main forwarding handler. Every non-`/ws` route lands here.
pub(crate) async fn proxy_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = format!("{}{}", state.upstream.http_base(), path_and_query);

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        path = %path_and_query,
        "Forwarding request"
    );

    let body_bytes = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        copy_request_headers(&parts.headers, headers);
    }

    let outbound = match builder.body(request_body(body_bytes)) {
        Ok(outbound) => outbound,
        Err(err) => {
            tracing::error!(request_id = %request_id, error = %err, "Failed to build upstream request");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    match tokio::time::timeout(state.request_timeout, state.client.request(outbound)).await {
        Ok(Ok(response)) => {
            let (mut parts, body) = response.into_parts();
            strip_response_headers(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(err)) if is_connection_refused(&err) => {
            tracing::debug!(request_id = %request_id, "Upstream refused connection");
            degraded_response()
        }
        Ok(Err(err)) => {
            tracing::error!(request_id = %request_id, error = %err, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, "Upstream request timed out");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// The deterministic reply sent while the backend is not yet listening.
fn degraded_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": BACKEND_STARTING })),
    )
        .into_response()
}

/// Copy inbound headers for the upstream request, dropping `host` and
/// `content-length` (both recomputed by the transport layer).
fn copy_request_headers(inbound: &HeaderMap, outbound: &mut HeaderMap) {
    for (name, value) in inbound.iter() {
        if name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
}

/// Drop upstream framing headers the proxy's own transport re-derives.
fn strip_response_headers(headers: &mut HeaderMap) {
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);
}

/// An empty inbound body is forwarded as no body at all; a zero-length
/// payload means something else on several methods.
fn request_body(bytes: Bytes) -> Body {
    if bytes.is_empty() {
        Body::empty()
    } else {
        Body::from(bytes)
    }
}

/// Walk the error chain looking for a refused TCP connection.
fn is_connection_refused(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[derive(Debug)]
    struct Wrapper(std::io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "wrapper: {}", self.0)
        }
    }

    impl std::error::Error for Wrapper {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_connection_refused_detected_through_chain() {
        let err = Wrapper(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(is_connection_refused(&err));
    }

    #[test]
    fn test_other_io_errors_not_special_cased() {
        let err = Wrapper(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(!is_connection_refused(&err));
    }

    #[test]
    fn test_request_header_filtering() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("proxy.local"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        inbound.insert("x-custom", HeaderValue::from_static("kept"));

        let mut outbound = HeaderMap::new();
        copy_request_headers(&inbound, &mut outbound);

        assert!(!outbound.contains_key(header::HOST));
        assert!(!outbound.contains_key(header::CONTENT_LENGTH));
        assert_eq!(outbound.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn test_response_header_filtering() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        strip_response_headers(&mut headers);

        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert!(!headers.contains_key(header::CONNECTION));
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }
}
