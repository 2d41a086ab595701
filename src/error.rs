//! Request-scoped error taxonomy and its JSON rendering.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Failures talking to a backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The target URL could not be turned into a request URI.
    #[error("invalid target URL {0}")]
    InvalidTarget(String),

    /// No complete response within the configured timeout.
    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    /// Connection refused, DNS failure, unsupported scheme.
    #[error("backend connection failed: {0}")]
    Connect(String),

    /// The connection was made but the exchange broke (reset, bad framing).
    #[error("backend exchange failed: {0}")]
    Upstream(String),

    /// The response body could not be read or exceeded the size limit.
    #[error("backend response body unreadable: {0}")]
    Body(String),
}

/// Everything a proxied request can fail with.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Network(#[from] ForwardError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed(_) | ProxyError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::Network(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error kind reported in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MethodNotAllowed(_) => "Method not allowed",
            ProxyError::InvalidRequest(_) => "Invalid request",
            ProxyError::RateLimited => "Rate limit exceeded",
            ProxyError::Network(_) => "Proxy service error",
            ProxyError::Internal(_) => "Internal proxy error",
        }
    }

    /// Client-safe message. Upstream details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ProxyError::MethodNotAllowed(method) => {
                format!("Method {} is not allowed by this proxy", method)
            }
            ProxyError::InvalidRequest(reason) => reason.clone(),
            ProxyError::RateLimited => "Too many requests, slow down".to_string(),
            ProxyError::Network(ForwardError::Timeout(after)) => {
                format!("Backend service did not respond within {}s", after.as_secs())
            }
            ProxyError::Network(_) => "Backend service is unreachable".to_string(),
            ProxyError::Internal(_) => "Unexpected error while handling the request".to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind(),
            message: self.public_message(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
