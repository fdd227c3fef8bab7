//! Database configuration

use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub postgres_url: String,
    /// Maximum PostgreSQL connections
    pub pg_max_connections: u32,
    /// Minimum PostgreSQL connections
    pub pg_min_connections: u32,
    /// Connection acquire timeout in seconds
    pub pg_acquire_timeout_secs: u64,
    /// Idle connection lifetime in seconds
    pub pg_idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost/vaultpay".to_string(),
            pg_max_connections: 25,
            pg_min_connections: 5,
            pg_acquire_timeout_secs: 3,
            pg_idle_timeout_secs: 300,
        }
    }
}

impl DatabaseConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            postgres_url: std::env::var("DATABASE_URL").unwrap_or(defaults.postgres_url),
            pg_max_connections: env_parse("DB_MAX_OPEN_CONNS").unwrap_or(defaults.pg_max_connections),
            pg_min_connections: env_parse("DB_MAX_IDLE_CONNS").unwrap_or(defaults.pg_min_connections),
            pg_acquire_timeout_secs: env_parse("PG_ACQUIRE_TIMEOUT").unwrap_or(defaults.pg_acquire_timeout_secs),
            pg_idle_timeout_secs: env_parse("DB_CONN_MAX_LIFETIME").unwrap_or(defaults.pg_idle_timeout_secs),
        }
    }

    /// Mask sensitive parts of the PostgreSQL URL for logging
    pub fn postgres_url_masked(&self) -> String {
        mask_url(&self.postgres_url)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn mask_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > scheme_end {
            let scheme = &url[..scheme_end + 3];
            let user_pass = &url[scheme_end + 3..at_pos];
            if let Some(colon_pos) = user_pass.find(':') {
                let user = &user_pass[..colon_pos];
                return format!("{}{}:***{}", scheme, user, &url[at_pos..]);
            }
        }
    }
    url.to_string()
}
