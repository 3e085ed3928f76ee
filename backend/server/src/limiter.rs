//! # Rate Limiting
//!
//! Advisory per-IP limiter in front of every route.
//!
//! - Fixed windows: the first request from a key opens a window, the next `limit` requests fit in it
//! - Requests past the limit get a 429 with `Retry-After` set to the seconds left in the window
//! - A background task sweeps windows that have run out so the map does not grow with every IP seen
//! - Keys come from `x-forwarded-for`, then `cf-connecting-ip`, then the peer address
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, warn};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after: Duration },
}

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    windows: DashMap<String, Window>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);

        if entry.count > self.limit {
            let elapsed = now.duration_since(entry.started);

            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        Decision::Allowed
    }

    /// Drops every window that has run out. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.window);

        before - self.windows.len()
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(every);

            loop {
                ticker.tick().await;

                let swept = limiter.sweep();
                if swept > 0 {
                    debug!("Swept {swept} rate limit windows");
                }
            }
        })
    }
}

pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("cf-connecting-ip"))
        .or_else(|| peer.map(|address| address.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| *address);
    let key = client_key(request.headers(), peer);

    if let Decision::Limited { retry_after } = state.limiter.check(&key) {
        warn!("Rate limit exceeded for IP: {key}");

        return Err(AppError::RateLimited {
            retry_after: retry_after.as_secs_f64().ceil() as u64,
        });
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_limit_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert_eq!(limiter.check_at("1.2.3.4", now), Decision::Allowed);
        assert_eq!(limiter.check_at("1.2.3.4", now), Decision::Allowed);
        assert_eq!(
            limiter.check_at("1.2.3.4", now + Duration::from_secs(15)),
            Decision::Limited {
                retry_after: Duration::from_secs(45)
            }
        );
        assert_eq!(limiter.check_at("5.6.7.8", now), Decision::Allowed);
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert_eq!(limiter.check_at("ip", now), Decision::Allowed);
        assert!(matches!(
            limiter.check_at("ip", now),
            Decision::Limited { .. }
        ));
        assert_eq!(
            limiter.check_at("ip", now + Duration::from_secs(60)),
            Decision::Allowed
        );
    }

    #[test]
    fn test_sweep_evicts_expired() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let now = Instant::now();

        limiter.check_at("old", now);
        limiter.check_at("new", now + Duration::from_secs(30));

        assert_eq!(limiter.sweep_at(now + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked(), 1);
        assert_eq!(limiter.sweep_at(now + Duration::from_secs(91)), 1);
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_client_key_order() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();

        assert_eq!(client_key(&headers, None), "unknown");
        assert_eq!(client_key(&headers, Some(peer)), "10.0.0.1");

        headers.insert("cf-connecting-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_key(&headers, Some(peer)), "9.9.9.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.1.1.1, 2.2.2.2"),
        );
        assert_eq!(client_key(&headers, Some(peer)), "1.1.1.1");
    }
}
