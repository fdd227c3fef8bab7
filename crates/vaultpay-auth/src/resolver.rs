//! Subject resolution
//!
//! Turns an access token into the claims of the subject it was issued to.
//! Two strategies:
//! - [`TokenResolver`]: verify the signature locally, with the token cache in front
//! - [`RemoteProfileResolver`]: ask an identity service for the caller's profile

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::TokenCache;
use crate::config::IdentityConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::{expiry_after, fingerprint, TokenCodec};
use crate::types::TokenClaims;

/// Resolves an access token to its subject
#[async_trait]
pub trait SubjectResolver: Send + Sync {
    async fn resolve(&self, access_token: &str) -> AuthResult<TokenClaims>;
}

// =============================================================================
// Local verification
// =============================================================================

/// Verifies tokens with the local codec, caching successful results
#[derive(Clone)]
pub struct TokenResolver {
    codec: TokenCodec,
    cache: TokenCache,
}

impl TokenResolver {
    pub fn new(codec: TokenCodec, cache: TokenCache) -> Self {
        Self { codec, cache }
    }
}

#[async_trait]
impl SubjectResolver for TokenResolver {
    async fn resolve(&self, access_token: &str) -> AuthResult<TokenClaims> {
        if let Some(claims) = self.cache.get(access_token).await {
            return Ok(claims);
        }

        let claims = self.codec.verify(access_token).map_err(|e| {
            debug!(token = %fingerprint(access_token), error = %e, "Token rejected");
            e
        })?;

        self.cache.insert(access_token, &claims).await;
        Ok(claims)
    }
}

// =============================================================================
// Remote identity service
// =============================================================================

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default, alias = "UUID", alias = "uuid", alias = "ID")]
    id: Option<String>,
    #[serde(default, alias = "Email")]
    email: Option<String>,
}

/// Resolves tokens by calling the identity service's profile endpoint with
/// the token as a bearer credential
#[derive(Clone)]
pub struct RemoteProfileResolver {
    client: reqwest::Client,
    config: IdentityConfig,
    cache: TokenCache,
    freshness: std::time::Duration,
}

impl RemoteProfileResolver {
    pub fn new(config: IdentityConfig, cache: TokenCache, freshness: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            cache,
            freshness,
        }
    }
}

#[async_trait]
impl SubjectResolver for RemoteProfileResolver {
    async fn resolve(&self, access_token: &str) -> AuthResult<TokenClaims> {
        if let Some(claims) = self.cache.get(access_token).await {
            return Ok(claims);
        }

        let response = self
            .client
            .get(&self.config.profile_url)
            .bearer_auth(access_token)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| AuthError::Identity(format!("profile request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            warn!(status = %status, "Identity service returned an error");
            return Err(AuthError::Identity(format!("profile lookup returned {}", status)));
        }

        let profile: Profile = response
            .json()
            .await
            .map_err(|e| AuthError::Identity(format!("invalid profile body: {}", e)))?;

        let subject = profile
            .id
            .filter(|id| !id.is_empty())
            .or(profile.email.filter(|e| !e.is_empty()))
            .ok_or(AuthError::InvalidCredentials)?;

        let now = Utc::now();
        let claims = TokenClaims {
            subject,
            exp: expiry_after(now, self.freshness)?.timestamp(),
            iat: now.timestamp(),
        };

        self.cache.insert_at(access_token, &claims, now).await;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use std::time::Duration as StdDuration;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long!!";

    #[tokio::test]
    async fn test_local_resolver_verifies_and_caches() {
        let codec = TokenCodec::new(SECRET).unwrap();
        let cache = TokenCache::new(StdDuration::from_secs(300));
        let resolver = TokenResolver::new(codec.clone(), cache.clone());

        let token = codec.issue("alice@example.com", StdDuration::from_secs(60)).unwrap();
        assert!(cache.get(&token).await.is_none());

        let claims = resolver.resolve(&token).await.unwrap();
        assert_eq!(claims.subject, "alice@example.com");
        assert_eq!(cache.get(&token).await.unwrap(), claims);

        // A cold cache gives the same answer
        let cold = TokenResolver::new(codec, TokenCache::new(StdDuration::from_secs(300)));
        assert_eq!(cold.resolve(&token).await.unwrap(), claims);
    }

    #[tokio::test]
    async fn test_local_resolver_rejects_bad_token_without_caching() {
        let codec = TokenCodec::new(SECRET).unwrap();
        let cache = TokenCache::new(StdDuration::from_secs(300));
        let resolver = TokenResolver::new(codec, cache.clone());

        assert!(matches!(resolver.resolve("a.b").await, Err(AuthError::MalformedToken)));
        assert!(cache.is_empty().await);
    }

    async fn profile_handler(headers: HeaderMap) -> Result<Json<serde_json::Value>, StatusCode> {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer good") => Ok(Json(serde_json::json!({
                "UUID": "8f14e45f-ceea-467f-a0e6-1a2b3c4d5e6f",
                "Email": "alice@example.com",
                "Balance": 0
            }))),
            Some("Bearer broken") => Err(StatusCode::INTERNAL_SERVER_ERROR),
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }

    async fn spawn_identity_service() -> String {
        let app = Router::new().route("/profile", get(profile_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/profile", addr)
    }

    fn remote(url: String, cache: TokenCache) -> RemoteProfileResolver {
        RemoteProfileResolver::new(
            IdentityConfig {
                profile_url: url,
                timeout: StdDuration::from_secs(3),
            },
            cache,
            StdDuration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_remote_resolver_uses_profile_id() {
        let url = spawn_identity_service().await;
        let cache = TokenCache::new(StdDuration::from_secs(300));
        let resolver = remote(url, cache.clone());

        let claims = resolver.resolve("good").await.unwrap();
        assert_eq!(claims.subject, "8f14e45f-ceea-467f-a0e6-1a2b3c4d5e6f");
        assert!(cache.get("good").await.is_some());
    }

    #[tokio::test]
    async fn test_remote_resolver_maps_statuses() {
        let url = spawn_identity_service().await;
        let resolver = remote(url, TokenCache::new(StdDuration::from_secs(300)));

        assert!(matches!(resolver.resolve("bad").await, Err(AuthError::InvalidCredentials)));
        assert!(matches!(resolver.resolve("broken").await, Err(AuthError::Identity(_))));
    }

    #[tokio::test]
    async fn test_remote_resolver_transport_failure() {
        // Nothing listens on port 9 of the loopback interface
        let resolver = remote(
            "http://127.0.0.1:9/profile".to_string(),
            TokenCache::new(StdDuration::from_secs(300)),
        );
        assert!(matches!(resolver.resolve("good").await, Err(AuthError::Identity(_))));
    }
}
