//! Per-client rate limiting.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cache::clock::{Clock, SystemClock};
use crate::error::ProxyError;
use crate::observability::metrics;

/// Error parsing a rate limit string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitParseError {
    #[error("expected \"N/period\" or \"N per period\", got {0:?}")]
    Format(String),

    #[error("request count must be a positive integer, got {0:?}")]
    Count(String),

    #[error("unknown period {0:?} (use second, minute, hour or day)")]
    Period(String),
}

/// `N` requests per `period`, e.g. "10/minute".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub period: Duration,
}

impl RateLimit {
    fn refill_per_sec(&self) -> f64 {
        self.requests as f64 / self.period.as_secs_f64()
    }
}

impl FromStr for RateLimit {
    type Err = RateLimitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        let (count, period) = text
            .split_once('/')
            .or_else(|| text.split_once(" per "))
            .ok_or_else(|| RateLimitParseError::Format(s.to_string()))?;

        let requests: u32 = count
            .trim()
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| RateLimitParseError::Count(count.trim().to_string()))?;

        let period = match period.trim() {
            "s" | "sec" | "second" | "seconds" => Duration::from_secs(1),
            "m" | "min" | "minute" | "minutes" => Duration::from_secs(60),
            "h" | "hour" | "hours" => Duration::from_secs(3600),
            "d" | "day" | "days" => Duration::from_secs(86_400),
            other => return Err(RateLimitParseError::Period(other.to_string())),
        };

        Ok(Self { requests, period })
    }
}

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn refill(&mut self, now: Instant, capacity: f64, refill_rate: f64) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        self.refill(now, capacity, refill_rate);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client IP.
pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    limit: RateLimit,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self::with_clock(limit, Arc::new(SystemClock))
    }

    pub fn with_clock(limit: RateLimit, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limit,
            clock,
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Take one token for `client`. Returns false when the client is over its limit.
    pub fn check(&self, client: IpAddr) -> bool {
        let now = self.clock.now();
        let capacity = self.limit.requests as f64;
        let rate = self.limit.refill_per_sec();

        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(capacity, now))
            .try_acquire(now, capacity, rate)
    }

    /// Forget clients whose bucket has fully refilled. Returns how many were dropped.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now();
        let capacity = self.limit.requests as f64;
        let rate = self.limit.refill_per_sec();

        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            bucket.refill(now, capacity, rate);
            bucket.tokens < capacity
        });
        before - buckets.len()
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").len()
    }
}

/// Health checks are never throttled.
fn is_exempt(request: &Request<Body>) -> bool {
    request.uri().path() == "/health" && matches!(*request.method(), Method::GET | Method::HEAD)
}

/// Admission middleware keyed on the peer IP.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = addr.ip();

    if is_exempt(&request) || limiter.check(client) {
        next.run(request).await
    } else {
        tracing::warn!(
            client = %client,
            method = %request.method(),
            path = %request.uri().path(),
            "Rate limit exceeded"
        );
        metrics::record_rate_limited();
        ProxyError::RateLimited.into_response()
    }
}
