//! Token Cache
//!
//! In-memory index from access-token string to resolved claims. Purely a
//! performance layer: a miss falls back to full verification, and `get`
//! never returns an entry at or past its expiry even if the sweeper has not
//! run yet.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::CacheConfig;
use crate::types::{CachedTokenEntry, TokenClaims};

const MIN_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

/// Shared token cache guarded by a single reader/writer lock
#[derive(Clone)]
pub struct TokenCache {
    entries: Arc<RwLock<HashMap<String, CachedTokenEntry>>>,
    freshness: std::time::Duration,
}

impl TokenCache {
    /// Create a cache whose entries live at most `freshness`
    pub fn new(freshness: std::time::Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            freshness,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.freshness)
    }

    /// Look up a token
    pub async fn get(&self, token: &str) -> Option<TokenClaims> {
        self.get_at(token, Utc::now()).await
    }

    /// Look up a token as of `now`
    pub async fn get_at(&self, token: &str, now: DateTime<Utc>) -> Option<TokenClaims> {
        let entries = self.entries.read().await;
        entries
            .get(token)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.claims.clone())
    }

    /// Insert or overwrite an entry
    pub async fn put(&self, entry: CachedTokenEntry) {
        self.entries.write().await.insert(entry.token.clone(), entry);
    }

    /// Cache resolved claims. The entry expires at the token's own expiry or
    /// after the freshness window, whichever comes first.
    pub async fn insert(&self, token: &str, claims: &TokenClaims) {
        self.insert_at(token, claims, Utc::now()).await
    }

    pub async fn insert_at(&self, token: &str, claims: &TokenClaims, now: DateTime<Utc>) {
        let token_expiry = claims.expires_at();
        let expires_at = Duration::from_std(self.freshness)
            .ok()
            .and_then(|window| now.checked_add_signed(window))
            .map_or(token_expiry, |fresh_until| fresh_until.min(token_expiry));

        self.put(CachedTokenEntry {
            token: token.to_string(),
            claims: claims.clone(),
            expires_at,
        })
        .await
    }

    /// Remove every expired entry; returns how many were removed
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Number of entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Start the background sweeper. The task stops when the returned
    /// handle is dropped or shut down.
    pub fn spawn_sweeper(&self, interval: std::time::Duration) -> SweeperHandle {
        let cache = self.clone();
        let period = interval.max(MIN_SWEEP_INTERVAL);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = cache.sweep().await;
                if removed > 0 {
                    debug!(removed, "Swept expired token cache entries");
                }
            }
        });

        SweeperHandle { handle: Some(handle) }
    }
}

/// Owns a background sweeper task
pub struct SweeperHandle {
    pub(crate) handle: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the task to finish
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
