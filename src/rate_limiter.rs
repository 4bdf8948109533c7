use crate::config::AppConfig;
use crate::errors::ServiceError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            requests_per_window: config.rate_limit_requests_per_window,
            window: Duration::from_secs(config.rate_limit_window_seconds),
        }
    }
}

/// Sliding-window rate limiter keyed by caller identifier. Each key holds
/// a log of request instants; only instants inside the window count
/// against the limit, so allowance recovers continuously rather than in
/// fixed-window bursts.
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// Records a request for `key` at the current instant.
    pub fn check(&self, key: &str) -> Result<(), ServiceError> {
        self.check_at(key, Instant::now())
    }

    /// Records a request at an explicit instant. `now` must not move
    /// backwards for a given key.
    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), ServiceError> {
        let mut log = self.entries.entry(key.to_owned()).or_default();

        while let Some(&oldest) = log.front() {
            if now.duration_since(oldest) >= self.config.window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.config.requests_per_window as usize {
            warn!(key, "Rate limit exceeded");
            return Err(ServiceError::RateLimitExceeded);
        }

        log.push_back(now);
        Ok(())
    }

    /// Drops every key whose entire log has left the window, so idle
    /// caller identifiers do not accumulate forever.
    pub fn cleanup_expired(&self) {
        self.cleanup_expired_at(Instant::now());
    }

    pub fn cleanup_expired_at(&self, now: Instant) {
        self.entries.retain(|_, log| {
            log.back()
                .map_or(false, |&last| now.duration_since(last) < self.config.window)
        });
    }

    /// Number of caller identifiers currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

/// Spawns a background task sweeping expired entries once per window.
pub fn start_cleanup_task(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.config.window);
        loop {
            interval.tick().await;
            limiter.cleanup_expired();
        }
    });
}

fn caller_key(request: &Request) -> Option<String> {
    request
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Axum middleware applying the limiter per `x-forwarded-for` identity.
/// Requests without an identifier pass through unlimited.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(key) = caller_key(&request) {
        if let Err(err) = limiter.check(&key) {
            return err.into_response();
        }
    }
    next.run(request).await
}
