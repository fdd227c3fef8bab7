//! VaultPay Server
//!
//! Issues bearer tokens and moves money between cards and ledger balances.
//!
//! # Usage
//!
//! ```bash
//! # Start with environment configuration
//! DATABASE_URL=postgres://... TOKEN_SECRET=... vaultpay-server
//!
//! # Start with a config file
//! vaultpay-server --config /path/to/config.toml
//!
//! # Override a nested setting
//! VAULTPAY__LEDGER__SETTLEMENT_TIMEOUT=20s vaultpay-server
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vaultpay_api::{create_router, ApiConfig, AppState};
use vaultpay_auth::{AuthService, PgCredentialStore};
use vaultpay_db::Database;
use vaultpay_ledger::{BalanceLedger, HttpSettlementGateway, PgLedgerStore};

use crate::config::ServerConfig;

// =============================================================================
// CLI Arguments
// =============================================================================

/// VaultPay Server - token issuance and balance ledger
#[derive(Parser, Debug)]
#[command(name = "vaultpay-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "VAULTPAY_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "VAULTPAY_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "VAULTPAY_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "VAULTPAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "VAULTPAY_LOG_FORMAT")]
    log_format: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long)]
    database_url: Option<String>,

    /// Skip database migrations on startup
    #[arg(long)]
    skip_migrations: bool,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    apply_args(&mut server_config, args);

    init_logging(&server_config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting VaultPay Server");

    server_config.validate()?;

    let db = init_database(&server_config).await?;

    let credentials = Arc::new(PgCredentialStore::new(db.account_repo()));
    let auth = Arc::new(AuthService::new(credentials, server_config.auth.clone())?);
    tracing::info!(
        access_ttl = ?server_config.auth.token.access_token_lifetime,
        cache_freshness = ?server_config.auth.cache.freshness,
        rate_limit = server_config.auth.rate_limit.requests_per_window,
        "Authentication service initialized"
    );

    let ledger = Arc::new(BalanceLedger::new(
        auth.resolver(),
        Arc::new(PgLedgerStore::new(db.balance_repo())),
        Arc::new(HttpSettlementGateway::from_config(&server_config.ledger)),
        server_config.ledger.clone(),
    ));
    tracing::info!(
        charge_url = %server_config.ledger.charge_url,
        credit_url = %server_config.ledger.credit_url,
        "Balance ledger initialized"
    );

    let sweeper = auth.spawn_cache_sweeper();
    let limiter_cleanup = auth.spawn_rate_limit_cleanup();

    let state = Arc::new(AppState::new(auth, ledger));
    let api_config = ApiConfig {
        enable_cors: server_config.api.enable_cors,
        cors_origins: server_config.api.cors_origins.clone(),
        enable_tracing: server_config.api.enable_tracing,
    };
    let app = create_router(state, api_config);

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        host = %server_config.server.host,
        port = %server_config.server.port,
        "Server listening"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    limiter_cleanup.shutdown().await;
    db.pg.close().await;

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

fn apply_args(config: &mut ServerConfig, args: Args) {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    if let Some(url) = args.database_url {
        config.database.postgres_url = url;
    }
    if args.skip_migrations {
        config.server.run_migrations = false;
    }
}

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        _ => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init()?,
    }

    Ok(())
}

/// Connect, migrate, and drop refresh tokens that expired while we were down
async fn init_database(config: &ServerConfig) -> anyhow::Result<Database> {
    let db = Database::connect(&config.database).await?;

    if !db.health_check().await {
        anyhow::bail!("Database health check failed");
    }

    if config.server.run_migrations {
        db.migrate().await?;
    }

    let purged = db.account_repo().purge_expired_refresh_tokens(chrono::Utc::now()).await?;
    if purged > 0 {
        tracing::info!(purged, "Removed expired refresh tokens");
    }

    Ok(db)
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
