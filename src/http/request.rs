//! Request identification and inbound metadata.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Echo the request ID on the response
//! - Extract the routing-relevant origin and the inbound scheme/host
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - `Origin` wins over `Referer`; neither means "no origin"

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::Uri;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that stamps `x-request-id` on requests lacking one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Convenience accessors over inbound headers.
pub trait RequestIdExt {
    /// The request ID, or `"unknown"` if the layer did not run.
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

fn non_blank(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The origin the client declared: `Origin`, then `Referer`. A blank or
/// non-text `Origin` counts as absent.
pub fn declared_origin(headers: &HeaderMap) -> Option<&str> {
    non_blank(headers, header::ORIGIN).or_else(|| non_blank(headers, header::REFERER))
}

/// Scheme the client used to reach the proxy.
///
/// The listener only speaks plain HTTP, so this is `http` unless the request
/// line carried an absolute `https` URI.
pub fn inbound_scheme(uri: &Uri) -> &str {
    uri.scheme_str().unwrap_or("http")
}

/// Host the client addressed: the `Host` header, else the URI authority.
pub fn inbound_host(headers: &HeaderMap, uri: &Uri) -> Option<HeaderValue> {
    headers.get(header::HOST).cloned().or_else(|| {
        uri.authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    })
}
