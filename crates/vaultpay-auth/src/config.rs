//! Authentication configuration
//!
//! Token lifetimes, the signing secret, token cache tuning and the optional
//! remote identity service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token signing configuration
    pub token: TokenConfig,
    /// Token cache configuration
    pub cache: CacheConfig,
    /// Per-client request limits on the token endpoints
    pub rate_limit: RateLimitConfig,
    /// Resolve access tokens through a remote identity service instead of
    /// verifying them locally
    pub identity: Option<IdentityConfig>,
}

/// Access and refresh token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Secret key for HMAC-SHA256 signing (should be at least 256 bits)
    pub secret: String,
    /// Access token lifetime
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,
    /// Refresh token lifetime
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
    /// Refresh token length in random bytes
    pub refresh_token_length: usize,
    /// Deadline for each credential store call
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(), // Must be set in production
            access_token_lifetime: Duration::from_secs(75 * 60), // 75 minutes
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
            refresh_token_length: 32,
            store_timeout: Duration::from_secs(3),
        }
    }
}

/// Token cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Longest time a resolved token stays cached
    #[serde(with = "humantime_serde")]
    pub freshness: Duration,
    /// Sweep interval; half the freshness window when unset
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(5 * 60),
            sweep_interval: None,
        }
    }
}

impl CacheConfig {
    /// Effective sweep interval
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.freshness / 2)
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Requests allowed per client address per window
    pub requests_per_window: u32,
    /// Window duration
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 100,
            window: Duration::from_secs(1),
        }
    }
}

/// Remote identity service used to resolve access tokens to a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Profile endpoint, called with the access token as a bearer credential
    pub profile_url: String,
    /// Request deadline
    #[serde(with = "humantime_serde", default = "default_identity_timeout")]
    pub timeout: Duration,
}

fn default_identity_timeout() -> Duration {
    Duration::from_secs(3)
}

impl AuthConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secret) = std::env::var("TOKEN_SECRET").or_else(|_| std::env::var("JWT_SECRET_KEY")) {
            config.token.secret = secret;
        }
        if let Some(ttl) = env_duration("TOKEN_TTL") {
            config.token.access_token_lifetime = ttl;
        }
        if let Some(ttl) = env_duration("REFRESH_TOKEN_TTL") {
            config.token.refresh_token_lifetime = ttl;
        }
        if let Some(ttl) = env_duration("TOKEN_CACHE_TTL") {
            config.cache.freshness = ttl;
        }
        if let Some(limit) = std::env::var("RATE_LIMIT").ok().and_then(|v| v.parse().ok()) {
            config.rate_limit.requests_per_window = limit;
        }
        if let Ok(url) = std::env::var("IDENTITY_PROFILE_URL") {
            config.identity = Some(IdentityConfig {
                profile_url: url,
                timeout: default_identity_timeout(),
            });
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.token.secret.is_empty() {
            errors.push("Token secret must be set".to_string());
        } else if self.token.secret.len() < 32 {
            errors.push("Token secret should be at least 256 bits (32 bytes)".to_string());
        }

        if self.token.access_token_lifetime.is_zero() {
            errors.push("Access token lifetime must be positive".to_string());
        }
        if self.token.refresh_token_lifetime.is_zero() {
            errors.push("Refresh token lifetime must be positive".to_string());
        }
        if self.token.store_timeout.is_zero() {
            errors.push("Credential store timeout must be positive".to_string());
        }
        if self.token.refresh_token_length < 16 {
            errors.push("Refresh token length should be at least 128 bits (16 bytes)".to_string());
        }

        if self.cache.freshness.is_zero() {
            errors.push("Token cache freshness must be positive".to_string());
        }
        if self.cache.sweep_interval().is_zero() {
            errors.push("Token cache sweep interval must be positive".to_string());
        }

        if self.rate_limit.enabled {
            if self.rate_limit.requests_per_window == 0 {
                errors.push("Rate limit must allow at least one request per window".to_string());
            }
            if self.rate_limit.window.is_zero() {
                errors.push("Rate limit window must be positive".to_string());
            }
        }

        if let Some(identity) = &self.identity {
            if identity.profile_url.is_empty() {
                errors.push("Identity profile URL must not be empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn env_duration(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| humantime_serde::re::humantime::parse_duration(&s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.token.access_token_lifetime, Duration::from_secs(75 * 60));
        assert_eq!(config.token.refresh_token_lifetime, Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.token.refresh_token_length, 32);
        assert_eq!(config.token.store_timeout, Duration::from_secs(3));
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(150));
        assert!(config.identity.is_none());
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_window, 100);
        assert_eq!(config.rate_limit.window, Duration::from_secs(1));
    }

    #[test]
    fn test_config_validation_missing_secret() {
        let config = AuthConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_short_secret() {
        let mut config = AuthConfig::default();
        config.token.secret = "short".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors[0].contains("32 bytes"));
    }

    #[test]
    fn test_config_validation_valid() {
        let mut config = AuthConfig::default();
        config.token.secret = "a".repeat(32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_sweep_interval() {
        let cache = CacheConfig {
            freshness: Duration::from_secs(60),
            sweep_interval: Some(Duration::from_secs(5)),
        };
        assert_eq!(cache.sweep_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_humantime_durations_deserialize() {
        let json = r#"{"token":{"secret":"s","access_token_lifetime":"10m"},"cache":{"freshness":"1m"}}"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.token.access_token_lifetime, Duration::from_secs(600));
        assert_eq!(config.token.refresh_token_lifetime, Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.cache.freshness, Duration::from_secs(60));
    }
}
