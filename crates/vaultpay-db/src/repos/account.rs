//! Account credential and refresh token repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{DbRefreshToken, DbResult};

/// Account repository for credential checks and refresh token storage
#[derive(Clone)]
pub struct AccountRepo {
    pool: PgPool,
}

impl AccountRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a refresh token for the user whose email and password match.
    ///
    /// The credential check and the insert are a single statement: zero rows
    /// inserted means no account matched. Passwords are compared by plain
    /// equality against the stored column.
    // TODO: store password hashes and verify them before the insert; the
    // users table currently holds plaintext passwords.
    pub async fn store_refresh_token(
        &self,
        email: &str,
        password: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, refresh_token, expires_at)
            SELECT id, $1, $2
            FROM users
            WHERE email = $3 AND password = $4
            "#
        )
        .bind(refresh_token)
        .bind(expires_at)
        .bind(email)
        .bind(password)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Find a refresh token by its exact value
    pub async fn find_refresh_token(&self, refresh_token: &str) -> DbResult<Option<DbRefreshToken>> {
        let token = sqlx::query_as::<_, DbRefreshToken>(
            r#"
            SELECT rt.user_id, u.email, rt.refresh_token, rt.expires_at
            FROM refresh_tokens rt
            JOIN users u ON u.id = rt.user_id
            WHERE rt.refresh_token = $1
            "#
        )
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Scopes granted to a client whose id and secret match, or `None`
    pub async fn find_client_scopes(&self, client_id: &str, client_secret: &str) -> DbResult<Option<Vec<String>>> {
        let scopes = sqlx::query_scalar::<_, Vec<String>>(
            r#"
            SELECT scope
            FROM clients
            WHERE client_id = $1 AND client_secret = $2
            "#
        )
        .bind(client_id)
        .bind(client_secret)
        .fetch_optional(&self.pool)
        .await?;

        Ok(scopes)
    }

    /// Remove refresh tokens that expired before `now`
    pub async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
