//! Periodic cleanup of in-memory state.
//!
//! # Responsibilities
//! - Drop expired cache entries that nobody has asked for again
//! - Forget rate-limit buckets of clients that went quiet

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::cache::ResponseCache;
use crate::security::rate_limit::RateLimiter;

/// Sweeps the cache and the rate limiter on a fixed interval until shutdown.
pub struct Sweeper {
    cache: Option<Arc<ResponseCache>>,
    limiter: Option<Arc<RateLimiter>>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        cache: Option<Arc<ResponseCache>>,
        limiter: Option<Arc<RateLimiter>>,
        interval: Duration,
    ) -> Self {
        Self {
            cache,
            limiter,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// One pass. Returns (expired entries, idle clients) removed.
    pub fn sweep(&self) -> (usize, usize) {
        let expired = self.cache.as_ref().map_or(0, |c| c.purge_expired());
        let idle = self.limiter.as_ref().map_or(0, |l| l.purge_idle());
        if expired > 0 || idle > 0 {
            tracing::debug!(expired, idle, "Housekeeping sweep");
        }
        (expired, idle)
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.cache.is_none() && self.limiter.is_none() {
            return;
        }

        tracing::info!(interval_secs = self.interval.as_secs(), "Housekeeping starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Housekeeping received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, ManualClock};
    use crate::http::response::ProxyResponse;
    use crate::security::rate_limit::RateLimit;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method, StatusCode};

    fn ok() -> ProxyResponse {
        ProxyResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"ok"),
        }
    }

    #[test]
    fn test_sweep_purges_cache_and_idle_clients() {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(ResponseCache::with_clock(Duration::from_secs(10), 10, clock.clone()));
        let limiter = Arc::new(RateLimiter::with_clock(
            RateLimit { requests: 2, period: Duration::from_secs(10) },
            clock.clone(),
        ));

        cache.put(CacheKey::new(&Method::GET, "http://b/a", &Bytes::new()), ok());
        assert!(limiter.check("10.0.0.1".parse().unwrap()));

        let sweeper = Sweeper::new(Some(cache.clone()), Some(limiter.clone()), Duration::from_secs(10));
        assert_eq!(sweeper.sweep(), (0, 0));

        clock.advance(Duration::from_secs(11));
        assert_eq!(sweeper.sweep(), (1, 1));
        assert!(cache.is_empty());
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(60), 10));
        let sweeper = Sweeper::new(Some(cache), None, Duration::from_secs(60));
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(sweeper.run(rx));
        tokio::task::yield_now().await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
