//! VaultPay Database Layer
//!
//! PostgreSQL persistence for the credential service and the balance ledger.
//!
//! # Tables
//!
//! - **users**: login credentials
//! - **refresh_tokens**: opaque refresh tokens issued at login
//! - **accounts**: one balance per canonical subject key
//! - **transactions**: append-only deposit / withdrawal log
//!
//! # Repository Pattern
//!
//! Each domain has its own repository holding a clone of the pool.

pub mod config;
pub mod error;
pub mod repos;
pub mod models;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use repos::*;
pub use models::*;

/// Database connection pool
pub struct Database {
    /// PostgreSQL connection pool
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.postgres_url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(Duration::from_secs(config.pg_acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(config.pg_idle_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        Ok(Self { pg })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pg).await.is_ok()
    }

    pub fn account_repo(&self) -> AccountRepo {
        AccountRepo::new(self.pg.clone())
    }

    pub fn balance_repo(&self) -> BalanceRepo {
        BalanceRepo::new(self.pg.clone())
    }
}
