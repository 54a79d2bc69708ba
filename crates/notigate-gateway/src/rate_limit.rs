// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window request limits.
//!
//! Counters are keyed by API key when one is sent, else by client IP. Each
//! limiter owns its own windows, so a route can sit behind several.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use notigate_config::RateLimitConfig;

use crate::auth::API_KEY_HEADER;
use crate::error::ApiError;

/// Checks between sweeps of expired windows.
const SWEEP_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    name: &'static str,
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
    checks: AtomicU64,
}

impl FixedWindowLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        Self {
            name,
            max_requests,
            window,
            windows: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Counts one request for `key`. On rejection returns the seconds until
    /// the window resets.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        let n = self.checks.fetch_add(1, Ordering::Relaxed);
        if n > 0 && n % SWEEP_INTERVAL == 0 {
            self.sweep(now);
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let remaining = self
                .window
                .saturating_sub(now.saturating_duration_since(entry.started));
            let retry_after = remaining.as_secs_f64().ceil() as u64;
            tracing::warn!(
                limiter = self.name,
                max = self.max_requests,
                "rate limit exceeded"
            );
            return Err(retry_after.max(1));
        }
        entry.count += 1;
        Ok(())
    }

    fn sweep(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// The general limit plus the per-route-group limits.
#[derive(Debug, Clone, Default)]
pub struct RateLimits {
    pub general: Option<Arc<FixedWindowLimiter>>,
    pub notification: Option<Arc<FixedWindowLimiter>>,
    pub multicast: Option<Arc<FixedWindowLimiter>>,
    pub topic: Option<Arc<FixedWindowLimiter>>,
}

impl RateLimits {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::default();
        }
        let limiter = |name, max, secs| {
            Some(Arc::new(FixedWindowLimiter::new(
                name,
                max,
                Duration::from_secs(secs),
            )))
        };
        Self {
            general: limiter("general", config.max_requests, config.window_secs),
            notification: limiter(
                "notification",
                config.notification_max,
                config.notification_window_secs,
            ),
            multicast: limiter(
                "multicast",
                config.multicast_max,
                config.multicast_window_secs,
            ),
            topic: limiter("topic", config.topic_max, config.topic_window_secs),
        }
    }
}

fn client_key(request: &Request) -> String {
    if let Some(key) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return format!("api_key:{key}");
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

/// Middleware enforcing one limiter.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<FixedWindowLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limiter
        .check(&client_key(&request))
        .map_err(|retry_after| ApiError::RateLimited { retry_after })?;
    Ok(next.run(request).await)
}
