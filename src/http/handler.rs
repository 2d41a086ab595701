//! Per-request orchestration.
//!
//! # Request States
//! ```text
//! RECEIVED → METHOD_CHECKED → RESOLVED → CACHE_CHECKED
//!     → CACHE_HIT                       → RETURNED
//!     → FORWARDING → (GET + 200: store) → RETURNED
//! any step → ERROR (structured JSON body)
//! ```
//!
//! # Design Decisions
//! - `/version` answers after the method check, before resolution
//! - The cache lock is never held across the backend call; concurrent
//!   misses on one key may both forward, last write wins
//! - Every failure is logged with request id, method, origin and target

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::cache::{CacheKey, ResponseCache};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::forwarder::{ForwardRequest, RequestForwarder};
use crate::http::request::{declared_origin, inbound_host, inbound_scheme, RequestIdExt};
use crate::http::response::ProxyResponse;
use crate::http::status::VersionInfo;
use crate::observability::metrics;
use crate::routing::{build_target_url, BackendResolver};

/// What a request ended as, before it becomes an HTTP response.
enum Outcome {
    Version,
    CacheHit(ProxyResponse),
    Forwarded(ProxyResponse),
}

impl Outcome {
    fn source(&self) -> &'static str {
        match self {
            Outcome::Version => "proxy",
            Outcome::CacheHit(_) => "cache",
            Outcome::Forwarded(_) => "upstream",
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Version => Json(VersionInfo::current()).into_response(),
            Outcome::CacheHit(response) | Outcome::Forwarded(response) => response.into_response(),
        }
    }
}

/// Log context accumulated while a request moves through the states.
struct RequestContext {
    request_id: String,
    method: Method,
    origin: Option<String>,
    target: Option<String>,
}

fn is_version_path(path: &str) -> bool {
    path.trim_matches('/') == "version"
}

/// Resolves, caches and forwards one request at a time; shared across tasks.
pub struct ProxyHandler {
    resolver: BackendResolver,
    cache: Option<Arc<ResponseCache>>,
    forwarder: RequestForwarder,
    allowed_methods: HashSet<Method>,
    max_body_size: usize,
}

impl ProxyHandler {
    pub fn new(
        resolver: BackendResolver,
        cache: Option<Arc<ResponseCache>>,
        forwarder: RequestForwarder,
        allowed_methods: impl IntoIterator<Item = Method>,
        max_body_size: usize,
    ) -> Self {
        Self {
            resolver,
            cache,
            forwarder,
            allowed_methods: allowed_methods.into_iter().collect(),
            max_body_size,
        }
    }

    /// Wire the handler from validated config. `cache` is `None` when caching
    /// is disabled.
    pub fn from_config(config: &ProxyConfig, cache: Option<Arc<ResponseCache>>) -> Self {
        let allowed_methods = config
            .routing
            .allowed_methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok());

        Self::new(
            BackendResolver::from_config(&config.routing),
            cache,
            RequestForwarder::new(config.timeouts.request(), config.security.max_body_size),
            allowed_methods,
            config.security.max_body_size,
        )
    }

    pub fn resolver(&self) -> &BackendResolver {
        &self.resolver
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn is_allowed(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Handle one inbound request. Never fails: errors become JSON responses.
    pub async fn handle(&self, request: Request<Body>, client: SocketAddr) -> Response {
        let start = Instant::now();
        let mut ctx = RequestContext {
            request_id: request.headers().request_id().to_string(),
            method: request.method().clone(),
            origin: declared_origin(request.headers()).map(str::to_string),
            target: None,
        };

        match self.process(request, client, &mut ctx).await {
            Ok(outcome) => {
                let source = outcome.source();
                let response = outcome.into_response();
                tracing::info!(
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    origin = ctx.origin.as_deref().unwrap_or("-"),
                    target = ctx.target.as_deref().unwrap_or("-"),
                    status = response.status().as_u16(),
                    source,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Request completed"
                );
                metrics::record_request(ctx.method.as_str(), response.status().as_u16(), source, start);
                response
            }
            Err(err) => {
                match &err {
                    ProxyError::Network(_) | ProxyError::Internal(_) => tracing::error!(
                        request_id = %ctx.request_id,
                        method = %ctx.method,
                        origin = ctx.origin.as_deref().unwrap_or("-"),
                        target = ctx.target.as_deref().unwrap_or("-"),
                        error = %err,
                        "Proxy request failed"
                    ),
                    _ => tracing::warn!(
                        request_id = %ctx.request_id,
                        method = %ctx.method,
                        origin = ctx.origin.as_deref().unwrap_or("-"),
                        target = ctx.target.as_deref().unwrap_or("-"),
                        error = %err,
                        "Request rejected"
                    ),
                }
                metrics::record_request(ctx.method.as_str(), err.status().as_u16(), "proxy", start);
                err.into_response()
            }
        }
    }

    async fn process(
        &self,
        request: Request<Body>,
        client: SocketAddr,
        ctx: &mut RequestContext,
    ) -> Result<Outcome, ProxyError> {
        if !self.is_allowed(&ctx.method) {
            return Err(ProxyError::MethodNotAllowed(ctx.method.clone()));
        }

        let (parts, body) = request.into_parts();

        if is_version_path(parts.uri.path()) {
            return Ok(Outcome::Version);
        }

        let backend = self.resolver.resolve(ctx.origin.as_deref());
        let target = build_target_url(backend, parts.uri.path(), parts.uri.query());
        ctx.target = Some(target.clone());

        let body = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|_| {
                ProxyError::InvalidRequest(format!(
                    "Request body is unreadable or larger than {} bytes",
                    self.max_body_size
                ))
            })?;

        let cache_slot = match &self.cache {
            Some(cache) if ctx.method == Method::GET => {
                let key = CacheKey::new(&ctx.method, target.clone(), &body);
                if let Some(hit) = cache.get(&key) {
                    tracing::debug!(request_id = %ctx.request_id, key = %key.digest(), "Cache hit");
                    metrics::record_cache_event("hit");
                    return Ok(Outcome::CacheHit(hit));
                }
                metrics::record_cache_event("miss");
                Some((cache, key))
            }
            _ => None,
        };

        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            target = %target,
            "Forwarding request"
        );

        let response = self
            .forwarder
            .forward(ForwardRequest {
                method: ctx.method.clone(),
                target,
                inbound_scheme: inbound_scheme(&parts.uri).to_string(),
                inbound_host: inbound_host(&parts.headers, &parts.uri),
                headers: parts.headers,
                body,
                client_ip: client.ip(),
            })
            .await?;

        if let Some((cache, key)) = cache_slot {
            if response.is_cacheable() {
                tracing::debug!(request_id = %ctx.request_id, key = %key.digest(), "Response cached");
                cache.put(key, response.clone());
                metrics::record_cache_event("store");
            }
        }

        Ok(Outcome::Forwarded(response))
    }
}

impl std::fmt::Debug for ProxyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandler")
            .field("resolver", &self.resolver)
            .field("cache_enabled", &self.cache.is_some())
            .field("forwarder", &self.forwarder)
            .field("allowed_methods", &self.allowed_methods)
            .finish()
    }
}
