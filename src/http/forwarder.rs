//! Outbound request construction and execution.
//!
//! # Responsibilities
//! - Build the backend request from the inbound one
//! - Sanitize headers both ways (see `security::headers`)
//! - Enforce the upstream timeout over connect, headers and body
//!
//! # Design Decisions
//! - Redirects are never followed; a 3xx goes back to the client as-is
//! - Single attempt, no retries: non-idempotent requests are never re-sent
//! - Bodies are buffered so a response can be cached and replayed

use std::error::Error as StdError;
use std::net::IpAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::ForwardError;
use crate::http::response::ProxyResponse;
use crate::security::headers::{
    apply_forwarded_headers, sanitize_request_headers, sanitize_response_headers,
};

/// Everything needed to issue one backend call.
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    /// Absolute backend URL.
    pub target: String,
    /// Inbound headers, unsanitized.
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: IpAddr,
    pub inbound_scheme: String,
    pub inbound_host: Option<HeaderValue>,
}

/// Render an error with its source chain, for logs.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// HTTP/1.1 client for backend calls.
#[derive(Clone)]
pub struct RequestForwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    max_body_size: usize,
}

impl RequestForwarder {
    pub fn new(timeout: Duration, max_body_size: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            timeout,
            max_body_size,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue the call and buffer the response.
    pub async fn forward(&self, request: ForwardRequest) -> Result<ProxyResponse, ForwardError> {
        let uri: Uri = request
            .target
            .parse()
            .map_err(|e| ForwardError::InvalidTarget(format!("{}: {}", request.target, e)))?;

        let mut headers = request.headers;
        sanitize_request_headers(&mut headers);
        apply_forwarded_headers(
            &mut headers,
            request.client_ip,
            &request.inbound_scheme,
            request.inbound_host.as_ref(),
        );

        let mut outbound = Request::new(Body::from(request.body));
        *outbound.method_mut() = request.method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;

        let exchange = async {
            let response = self.client.request(outbound).await.map_err(|e| {
                if e.is_connect() {
                    ForwardError::Connect(describe(&e))
                } else {
                    ForwardError::Upstream(describe(&e))
                }
            })?;

            let (mut parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), self.max_body_size)
                .await
                .map_err(|e| ForwardError::Body(describe(&e)))?;

            sanitize_response_headers(&mut parts.headers);

            Ok(ProxyResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(self.timeout)),
        }
    }
}

impl std::fmt::Debug for RequestForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestForwarder")
            .field("timeout", &self.timeout)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}
