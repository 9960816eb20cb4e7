//! Sliding-window rate limiting per client origin.
//!
//! The window map is an injected component held in application state, not a
//! module-level singleton, so it can be swapped for a distributed store.
//! As built it is process-local: horizontally scaled deployments rate-limit
//! per instance.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::error::AuthError;

/// Sentinel origin key when no address can be derived from the request.
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// Sliding-window request counter keyed by client origin, independent of
/// identity. Safe for concurrent use; each origin's window mutates under
/// its dashmap shard lock.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    windows: Arc<DashMap<String, Vec<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max_requests: max_requests.max(1) as usize,
            window,
        }
    }

    /// Check and record one request for the origin. On rejection, returns
    /// how long until the oldest counted request falls out of the window.
    pub fn check(&self, origin: &str) -> Result<(), Duration> {
        self.check_at(origin, Instant::now())
    }

    fn check_at(&self, origin: &str, now: Instant) -> Result<(), Duration> {
        let mut timestamps = self.windows.entry(origin.to_string()).or_default();

        // Purge entries older than the trailing window before counting.
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        timestamps.push(now);
        Ok(())
    }
}

/// Derive the rate-limit key for a request: first hop of `x-forwarded-for`,
/// else the peer address, else the unknown sentinel.
pub fn client_origin(headers: &HeaderMap, extensions: &Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string())
}

/// Middleware applying the limiter in front of a route tree.
pub async fn rate_limit_middleware(
    State(limiter): State<SlidingWindowLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let origin = client_origin(req.headers(), req.extensions());

    match limiter.check(&origin) {
        Ok(()) => Ok(next.run(req).await),
        Err(retry_after) => {
            tracing::warn!(origin = %origin, "Rate limit exceeded");
            Err(AuthError::RateLimited(Some(retry_after.as_secs().max(1))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_requests_pass_the_next_is_rejected() {
        let limiter = SlidingWindowLimiter::new(100, Duration::from_secs(900));
        let start = Instant::now();

        for _ in 0..100 {
            assert!(limiter.check_at("203.0.113.9", start).is_ok());
        }
        assert!(limiter.check_at("203.0.113.9", start).is_err());
    }

    #[test]
    fn window_expiry_readmits_the_origin() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("origin", start).is_ok());
        }
        assert!(limiter.check_at("origin", start).is_err());

        // Just past the trailing window, the slate is clean.
        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at("origin", later).is_ok());
    }

    #[test]
    fn origins_are_counted_independently() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at("a", start).is_ok());
        assert!(limiter.check_at("b", start).is_ok());
        assert!(limiter.check_at("a", start).is_err());
    }

    #[test]
    fn rejection_reports_time_until_admission() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_at("origin", start).unwrap();
        let retry = limiter
            .check_at("origin", start + Duration::from_secs(20))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(40));
    }

    #[test]
    fn origin_falls_back_to_sentinel() {
        let origin = client_origin(&HeaderMap::new(), &Extensions::new());
        assert_eq!(origin, UNKNOWN_ORIGIN);
    }

    #[test]
    fn forwarded_header_wins_and_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 10.0.0.1".parse().unwrap(),
        );
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 8080))));

        assert_eq!(client_origin(&headers, &extensions), "203.0.113.9");
    }
}
