//! Rate Limiting
//!
//! Sliding-window request limits keyed by client address, kept in process
//! memory. Buckets idle for two windows are dropped by [`RateLimiter::cleanup`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::SweeperHandle;
use crate::config::RateLimitConfig;
use crate::error::{AuthError, AuthResult};

/// Per-key sliding window limiter
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<String, RateBucket>>>,
}

#[derive(Debug, Clone)]
struct RateBucket {
    /// Request timestamps within the window, oldest first
    requests: Vec<Instant>,
    last_seen: Instant,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a request from `ip`, failing once the window is full
    pub async fn check_ip_limit(&self, ip: &str) -> AuthResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let limit = self.config.requests_per_window as usize;
        let window = self.config.window;
        let now = Instant::now();

        let mut buckets = self.buckets.write().await;
        let bucket = buckets.entry(ip.to_string()).or_insert_with(|| RateBucket {
            requests: Vec::new(),
            last_seen: now,
        });

        bucket.requests.retain(|&t| now.duration_since(t) < window);
        bucket.last_seen = now;

        if bucket.requests.len() >= limit {
            let retry_after = bucket
                .requests
                .first()
                .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(window);
            warn!(ip = %ip, limit, "Rate limit exceeded");
            return Err(AuthError::RateLimitExceeded {
                retry_after: retry_after_secs(retry_after),
            });
        }

        bucket.requests.push(now);
        Ok(())
    }

    /// Drop buckets that have been idle for two windows
    pub async fn cleanup(&self) -> usize {
        let idle = self.config.window * 2;
        let now = Instant::now();

        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) < idle);
        before - buckets.len()
    }

    /// Number of tracked client addresses
    pub async fn tracked(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` in the background
    pub fn spawn_cleanup(&self, interval: Duration) -> SweeperHandle {
        let limiter = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup().await;
                if removed > 0 {
                    debug!(removed, "Dropped idle rate limit buckets");
                }
            }
        });

        SweeperHandle { handle: Some(handle) }
    }
}

/// Whole seconds, rounded up so clients never retry early
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs();
    if wait.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}
