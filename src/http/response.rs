//! Response handling and transformation.
//!
//! # Responsibilities
//! - Carry a fully buffered backend response (status, headers, body)
//! - Turn it back into an axum response for the client
//!
//! # Design Decisions
//! - Bodies are buffered so a response can be cached and re-served verbatim
//! - Framing headers were already stripped by the forwarder; hyper recomputes
//!   Content-Length from the buffered body

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

/// A successful backend exchange, as returned to the client and as cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    /// Only plain 200 responses are eligible for the cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
