//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router: `GET`/`HEAD /health` plus the catch-all proxy routes
//! - Wire up middleware (request ID, tracing, panic recovery, rate limit)
//! - Run housekeeping alongside the listener
//! - Serve until the shutdown signal, then drain

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::cache::ResponseCache;
use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig, ValidationError};
use crate::error::ProxyError;
use crate::http::handler::ProxyHandler;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::status::health;
use crate::lifecycle::Sweeper;
use crate::security::rate_limit::{rate_limit_middleware, RateLimit, RateLimiter};

/// Application state injected into the proxy route.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ProxyHandler>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    handler: Arc<ProxyHandler>,
    limiter: Option<Arc<RateLimiter>>,
}

impl HttpServer {
    /// Build every subsystem from configuration. Refuses configs that fail
    /// validation, so admission control is never silently dropped.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let cache = config.cache.enabled.then(|| {
            Arc::new(ResponseCache::new(config.cache.ttl(), config.cache.max_entries))
        });

        let limiter = if config.rate_limit.enabled {
            let limit = config.rate_limit.limit.parse::<RateLimit>().map_err(|e| {
                ConfigError::Validation(vec![ValidationError::new("rate_limit.limit", e.to_string())])
            })?;
            Some(Arc::new(RateLimiter::new(limit)))
        } else {
            None
        };

        let handler = Arc::new(ProxyHandler::from_config(&config, cache));
        Ok(Self::from_parts(config, handler, limiter))
    }

    /// Assemble a server around pre-built components.
    pub fn from_parts(
        config: ProxyConfig,
        handler: Arc<ProxyHandler>,
        limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        let state = AppState {
            handler: handler.clone(),
        };
        let router = Self::build_router(state, limiter.clone());
        Self {
            router,
            config,
            handler,
            limiter,
        }
    }

    fn build_router(state: AppState, limiter: Option<Arc<RateLimiter>>) -> Router {
        // Only GET/HEAD /health is answered locally; other methods are proxied.
        let mut router = Router::new()
            .route("/health", get(health).fallback(proxy_handler))
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state);

        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(propagate_request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mappings = self.handler.resolver().len(),
            default_service = %self.handler.resolver().default_service(),
            cache = self.config.cache.enabled,
            rate_limit = self.limiter.is_some(),
            "HTTP server starting"
        );

        let sweeper = Sweeper::new(
            self.handler.cache().cloned(),
            self.limiter.clone(),
            self.config.cache.ttl(),
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<ProxyHandler> {
        &self.handler
    }
}

async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    state.handler.handle(request, addr).await
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    ProxyError::Internal(detail.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_carries_request_id() {
        let server = HttpServer::new(ProxyConfig::default()).unwrap();
        let app = server
            .router
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_disallowed_method_never_leaves_the_proxy() {
        let server = HttpServer::new(ProxyConfig::default()).unwrap();
        let app = server
            .router
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4001))));

        let response = app
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_with_disallowed_method_gets_json_error() {
        let server = HttpServer::new(ProxyConfig::default()).unwrap();
        let app = server
            .router
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4002))));

        let response = app
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Method not allowed");
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let mut config = ProxyConfig::default();
        config.rate_limit.limit = "often".into();

        match HttpServer::new(config) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "rate_limit.limit");
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("server built with an unparseable rate limit"),
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Internal proxy error");
        assert!(!json["message"].as_str().unwrap().contains("boom"));
    }

    #[test]
    fn test_disabled_features_build_nothing() {
        let mut config = ProxyConfig::default();
        config.cache.enabled = false;
        config.rate_limit.enabled = false;
        let server = HttpServer::new(config).unwrap();
        assert!(server.handler().cache().is_none());
        assert!(server.limiter.is_none());
    }
}
