//! PostgreSQL-backed credential store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vaultpay_db::AccountRepo;

use crate::credentials::CredentialStore;
use crate::error::AuthResult;
use crate::types::RefreshTokenRecord;

/// Credential store over the `users`, `refresh_tokens` and `clients` tables
#[derive(Clone)]
pub struct PgCredentialStore {
    repo: AccountRepo,
}

impl PgCredentialStore {
    pub fn new(repo: AccountRepo) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn store_refresh_token(
        &self,
        email: &str,
        password: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        Ok(self
            .repo
            .store_refresh_token(email, password, refresh_token, expires_at)
            .await?)
    }

    async fn find_refresh_token(&self, refresh_token: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self
            .repo
            .find_refresh_token(refresh_token)
            .await?
            .map(RefreshTokenRecord::from))
    }

    async fn find_client_scopes(&self, client_id: &str, client_secret: &str) -> AuthResult<Option<Vec<String>>> {
        Ok(self.repo.find_client_scopes(client_id, client_secret).await?)
    }
}
