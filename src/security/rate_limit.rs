//! Fixed-window per-client rate limiting keyed on source IP.

use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::error::GatewayError;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::observability::metrics;

/// One counting window for one client.
#[derive(Debug)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Counts requests per source IP in fixed windows. A window starts on the
/// first request from an address and resets wholesale once it elapses, so a
/// client that exhausts its budget gets the full budget back at the boundary.
pub struct RateLimiter {
    windows: DashMap<IpAddr, RateWindow>,
    max_requests: u32,
    window: Duration,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn check(&self, ip: IpAddr) -> RateDecision {
        let now = Instant::now();
        self.maybe_sweep(now);

        let mut entry = self.windows.entry(ip).or_insert_with(|| RateWindow {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window - now.duration_since(entry.window_start);
            return RateDecision::Limited { retry_after };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    /// Drop windows that have fully elapsed. Runs at most once per window so
    /// the common path stays a single shard lookup.
    fn maybe_sweep(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock().expect("rate limiter sweep clock poisoned");
            if now.duration_since(*last) < self.window {
                return;
            }
            *last = now;
        }
        let window = self.window;
        self.windows
            .retain(|_, w| now.duration_since(w.window_start) < window);
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Global pipeline stage: reject with 429 once a client's window is spent.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = &state.rate_limiter else {
        return next.run(request).await;
    };

    match limiter.check(addr.ip()) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            metrics::record_rate_limited();
            let ctx = request
                .extensions()
                .get::<RequestContext>()
                .cloned()
                .unwrap_or_else(|| RequestContext::new(String::new()));
            tracing::warn!(
                client = %addr.ip(),
                request_id = %ctx.correlation_id,
                "Rate limit exceeded"
            );

            let mut response =
                GatewayError::RateLimited.into_response_for(&ctx, request.uri().path());
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window: Duration) -> RateLimiter {
        RateLimiter {
            windows: DashMap::new(),
            max_requests,
            window,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn budget_is_enforced_within_a_window() {
        let limiter = limiter(3, Duration::from_secs(60));

        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                limiter.check(ip(1)),
                RateDecision::Allowed { remaining: expected_remaining }
            );
        }
        assert!(matches!(limiter.check(ip(1)), RateDecision::Limited { .. }));
    }

    #[test]
    fn clients_are_counted_independently() {
        let limiter = limiter(1, Duration::from_secs(60));

        assert!(matches!(limiter.check(ip(1)), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check(ip(1)), RateDecision::Limited { .. }));
        assert!(matches!(limiter.check(ip(2)), RateDecision::Allowed { .. }));
    }

    #[test]
    fn window_expiry_restores_the_full_budget() {
        let limiter = limiter(2, Duration::from_millis(40));

        assert!(matches!(limiter.check(ip(1)), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check(ip(1)), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check(ip(1)), RateDecision::Limited { .. }));

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(limiter.check(ip(1)), RateDecision::Allowed { remaining: 1 });
    }

    #[test]
    fn stale_windows_are_swept() {
        let limiter = limiter(5, Duration::from_millis(30));
        limiter.check(ip(1));
        limiter.check(ip(2));
        assert_eq!(limiter.tracked_clients(), 2);

        std::thread::sleep(Duration::from_millis(50));
        // The next check triggers the sweep; only the fresh client survives.
        limiter.check(ip(3));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn limited_response_reports_time_until_reset() {
        let limiter = limiter(1, Duration::from_secs(60));
        limiter.check(ip(9));

        match limiter.check(ip(9)) {
            RateDecision::Limited { retry_after } => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::from_secs(58));
            }
            other => panic!("expected Limited, got {other:?}"),
        }
    }
}
