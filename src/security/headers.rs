//! Header sanitization for both directions of a proxied exchange.
//!
//! # Responsibilities
//! - Strip Host, Content-Length and hop-by-hop headers from requests
//! - Replace X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Strip framing headers from backend responses

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// Hop-by-hop headers; never meaningful past one connection.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    KEEP_ALIVE,
    PROXY_CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Headers the client-side transport recomputes for responses.
const RESPONSE_FRAMING: [HeaderName; 5] = [
    header::CONTENT_ENCODING,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
    KEEP_ALIVE,
];

/// Remove headers named as tokens in a `Connection` header.
fn strip_connection_tokens(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
}

/// Prepare inbound headers for the outbound request.
///
/// Host and Content-Length are recomputed by the client transport. Encoding is
/// pinned to identity because Content-Encoding is dropped on the way back.
pub fn sanitize_request_headers(headers: &mut HeaderMap) {
    strip_connection_tokens(headers);
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
}

/// Overwrite the X-Forwarded-* trio describing the inbound hop.
pub fn apply_forwarded_headers(
    headers: &mut HeaderMap,
    client_ip: IpAddr,
    proto: &str,
    host: Option<&HeaderValue>,
) {
    headers.remove(X_FORWARDED_FOR);
    headers.remove(X_FORWARDED_PROTO);
    headers.remove(X_FORWARDED_HOST);

    if let Ok(value) = HeaderValue::from_str(&client_ip.to_string()) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(proto) {
        headers.insert(X_FORWARDED_PROTO, value);
    }
    if let Some(host) = host {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
}

/// Strip framing headers from a backend response before it is cached or
/// handed to the client.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    strip_connection_tokens(headers);
    for name in RESPONSE_FRAMING.iter() {
        headers.remove(name);
    }
}
