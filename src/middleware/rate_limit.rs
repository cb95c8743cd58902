//! Global per-client request limit.
//!
//! Each client key gets a fixed window of `window` length; the first request
//! opens it, at most `max_requests` are admitted until it expires. Windows
//! live in a Moka cache whose TTL equals the window, so idle clients are
//! evicted on their own and `max_clients` caps memory.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::sync::Cache;
use tracing::warn;

use crate::{config::RateLimitConfig, error::AppError, state::AppState};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    trust_proxy: bool,
    clients: Cache<Arc<str>, Arc<Mutex<Window>>>,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        let window = Duration::from_secs(cfg.window_secs.max(1));
        let clients = Cache::builder()
            .max_capacity(cfg.max_clients)
            .time_to_live(window)
            .build();
        Self {
            max_requests: cfg.max_requests,
            window,
            trust_proxy: cfg.trust_proxy,
            clients,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let slot = self.clients.get_with(Arc::from(key), || {
            Arc::new(Mutex::new(Window {
                started: now,
                count: 0,
            }))
        });
        let mut window = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // The cache TTL normally drops the entry first; this covers a read
        // that races the eviction.
        if now.duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(window.started));
            return Decision::Limited { retry_after };
        }
        window.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - window.count,
        }
    }

    /// Peer IP by default. The first `X-Forwarded-For` hop is used only when
    /// the limiter is configured to trust the proxy in front of it.
    fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let forwarded = self
            .trust_proxy
            .then(|| {
                headers
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .flatten();
        forwarded
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let limiter = &state.rate_limiter;
    let key = limiter.client_key(request.headers(), peer);
    let limit = HeaderValue::from(limiter.max_requests());

    match limiter.check(&key) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, limit);
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            warn!(client = %key, "rate limit exceeded");
            let mut response = AppError::RateLimited.into_response();
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, limit);
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
            headers.insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs,
            max_clients: 1_000,
            trust_proxy: false,
        })
    }

    fn proxied(max_requests: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs: 60,
            max_clients: 1_000,
            trust_proxy: true,
        })
    }

    #[test]
    fn admits_up_to_the_ceiling() {
        let rl = limiter(3, 60);
        let now = Instant::now();
        assert_eq!(rl.check_at("a", now), Decision::Allowed { remaining: 2 });
        assert_eq!(rl.check_at("a", now), Decision::Allowed { remaining: 1 });
        assert_eq!(rl.check_at("a", now), Decision::Allowed { remaining: 0 });
        assert!(matches!(rl.check_at("a", now), Decision::Limited { .. }));
    }

    #[test]
    fn clients_are_independent() {
        let rl = limiter(1, 60);
        let now = Instant::now();
        assert!(matches!(rl.check_at("a", now), Decision::Allowed { .. }));
        assert!(matches!(rl.check_at("b", now), Decision::Allowed { .. }));
        assert!(matches!(rl.check_at("a", now), Decision::Limited { .. }));
    }

    #[test]
    fn window_resets_after_expiry() {
        let rl = limiter(1, 60);
        let start = Instant::now();
        assert!(matches!(rl.check_at("a", start), Decision::Allowed { .. }));
        match rl.check_at("a", start + Duration::from_secs(20)) {
            Decision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(40)),
            other => panic!("expected limit, got {other:?}"),
        }
        assert!(matches!(
            rl.check_at("a", start + Duration::from_secs(61)),
            Decision::Allowed { remaining: 0 }
        ));
    }

    #[test]
    fn tracked_clients_stay_bounded() {
        let rl = RateLimiter::new(&RateLimitConfig {
            max_requests: 5,
            window_secs: 900,
            max_clients: 100,
            trust_proxy: false,
        });
        let now = Instant::now();
        for i in 0..5_000 {
            rl.check_at(&format!("10.0.{}.{}", i / 256, i % 256), now);
        }
        rl.clients.run_pending_tasks();
        assert!(rl.clients.entry_count() <= 100);
    }

    #[test]
    fn client_key_uses_peer_and_ignores_forwarded_for() {
        let rl = limiter(1, 60);
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(rl.client_key(&headers, Some(peer)), "10.0.0.1");
        assert_eq!(rl.client_key(&headers, None), "unknown");
    }

    #[test]
    fn trusted_proxy_keys_on_first_forwarded_hop() {
        let rl = proxied(1);
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        assert_eq!(rl.client_key(&headers, Some(peer)), "10.0.0.1");
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(rl.client_key(&headers, Some(peer)), "203.0.113.9");
    }
}
