//! Server Configuration
//!
//! Layered in increasing precedence: plain environment variables read by
//! each crate's `from_env`, config files, `VAULTPAY__` prefixed environment
//! variables, then CLI arguments (applied in `main`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use vaultpay_auth::AuthConfig;
use vaultpay_db::DatabaseConfig;
use vaultpay_ledger::LedgerConfig;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server binding configuration
    pub server: ServerSettings,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Token issuance and cache configuration
    pub auth: AuthConfig,
    /// Settlement gateway and ledger deadlines
    pub ledger: LedgerConfig,
    /// HTTP surface configuration
    pub api: ApiSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Run migrations on startup
    pub run_migrations: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            run_migrations: true,
        }
    }
}

impl ServerSettings {
    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {}", self.host, self.port, e))
    }
}

/// API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Enable request tracing
    pub enable_tracing: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            enable_tracing: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the plain environment variables each crate
    /// understands (`DATABASE_URL`, `TOKEN_SECRET`, `PAYMENT_CHARGE_URL`, ...)
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig::from_env(),
            auth: AuthConfig::from_env(),
            ledger: LedgerConfig::from_env(),
            ..Default::default()
        }
    }

    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::from_env())?);

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("VAULTPAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let server_config: ServerConfig = builder.build()?.try_deserialize()?;
        Ok(server_config)
    }

    /// Validate every section, collecting all problems
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.auth.validate() {
            errors.extend(e.into_iter().map(|m| format!("auth: {}", m)));
        }
        if let Err(e) = self.ledger.validate() {
            errors.extend(e.into_iter().map(|m| format!("ledger: {}", m)));
        }
        if self.database.postgres_url.is_empty() {
            errors.push("database: postgres_url must be set".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!("logging: unknown format {:?}", self.logging.format));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("invalid configuration:\n  {}", errors.join("\n  "))
        }
    }

    /// Create a configuration for local development
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.port = 3000;
        config.auth.token.secret = "development-secret-key-not-for-production".to_string();
        config.ledger.settlement_timeout = Duration::from_secs(30);
        config.logging.level = "debug".to_string();
        config
    }
}
