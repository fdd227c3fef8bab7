//! VaultPay Authentication Layer
//!
//! Bearer credentials for the VaultPay services:
//!
//! - **Token Codec**: HMAC-SHA256 signed compact access tokens
//! - **Credential Verifier**: email/password login issuing access + refresh tokens
//! - **Token Cache**: short-lived index of already verified tokens, swept in the background
//! - **Subject Resolver**: the seam the balance ledger uses to identify callers
//! - **Rate Limiter**: per-address sliding windows for the token endpoints
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      AuthService                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  login ──► CredentialVerifier ──► CredentialStore        │
//! │                   │                                      │
//! │                   ▼                                      │
//! │              TokenCodec ◄──── TokenResolver ◄── ledger   │
//! │                                    │                     │
//! │                                    ▼                     │
//! │                               TokenCache ◄── sweeper     │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod postgres;
pub mod rate_limit;
pub mod resolver;
pub mod token;
pub mod types;

pub use cache::{SweeperHandle, TokenCache};
pub use config::{AuthConfig, CacheConfig, IdentityConfig, RateLimitConfig, TokenConfig};
pub use credentials::{CredentialStore, CredentialVerifier, InMemoryCredentialStore};
pub use error::{AuthError, AuthResult};
pub use postgres::PgCredentialStore;
pub use rate_limit::RateLimiter;
pub use resolver::{RemoteProfileResolver, SubjectResolver, TokenResolver};
pub use token::TokenCodec;
pub use types::*;

use std::sync::Arc;
use tracing::info;

/// Main authentication service combining the codec, cache, verifier and resolver
#[derive(Clone)]
pub struct AuthService {
    pub codec: TokenCodec,
    pub cache: TokenCache,
    pub verifier: CredentialVerifier,
    pub rate_limiter: RateLimiter,
    resolver: Arc<dyn SubjectResolver>,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new auth service over a credential store
    pub fn new(store: Arc<dyn CredentialStore>, config: AuthConfig) -> AuthResult<Self> {
        let codec = TokenCodec::from_config(&config.token)?;
        let cache = TokenCache::from_config(&config.cache);
        let verifier = CredentialVerifier::new(store, codec.clone(), config.token.clone());
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());

        let resolver: Arc<dyn SubjectResolver> = match &config.identity {
            Some(identity) => {
                info!(profile_url = %identity.profile_url, "Resolving tokens through identity service");
                Arc::new(RemoteProfileResolver::new(
                    identity.clone(),
                    cache.clone(),
                    config.cache.freshness,
                ))
            }
            None => Arc::new(TokenResolver::new(codec.clone(), cache.clone())),
        };

        Ok(Self {
            codec,
            cache,
            verifier,
            rate_limiter,
            resolver,
            config,
        })
    }

    /// Exchange credentials for a token pair
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        self.verifier.authenticate(email, password).await
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        self.verifier.refresh(refresh_token).await
    }

    /// Client-credentials grant
    pub async fn client_token(&self, client_id: &str, client_secret: &str, scope: &str) -> AuthResult<ClientToken> {
        self.verifier.authenticate_client(client_id, client_secret, scope).await
    }

    /// Validate an access token through the cached resolver
    pub async fn check(&self, access_token: &str) -> AuthResult<TokenClaims> {
        self.resolver.resolve(access_token).await
    }

    /// Resolver handed to the balance ledger
    pub fn resolver(&self) -> Arc<dyn SubjectResolver> {
        self.resolver.clone()
    }

    /// Start the token cache sweeper at the configured interval
    pub fn spawn_cache_sweeper(&self) -> SweeperHandle {
        let interval = self.config.cache.sweep_interval();
        info!(interval = ?interval, "Starting token cache sweeper");
        self.cache.spawn_sweeper(interval)
    }

    /// Start dropping idle rate limit buckets once per minute
    pub fn spawn_rate_limit_cleanup(&self) -> SweeperHandle {
        self.rate_limiter.spawn_cleanup(std::time::Duration::from_secs(60))
    }

    /// Get the config reference
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}
