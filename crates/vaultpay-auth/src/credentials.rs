//! Credential Verifier
//!
//! Checks an email/password pair against the account store and issues a
//! token pair on success:
//! - Access token signed by the [`TokenCodec`]
//! - Opaque random refresh token persisted by the store
//!
//! The password check and the refresh token insert happen in one store
//! operation. Stored passwords are compared by plain equality; there is no
//! hashing in this path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::{expiry_after, fingerprint, TokenCodec};
use crate::types::{ClientToken, RefreshTokenRecord, TokenPair};

/// Account store used by the verifier
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist `refresh_token` for the account whose email and password
    /// match. Returns `false` when no account matched.
    async fn store_refresh_token(
        &self,
        email: &str,
        password: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Look up a refresh token by exact value
    async fn find_refresh_token(&self, refresh_token: &str) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Scopes granted to the client whose id and secret match, or `None`
    async fn find_client_scopes(&self, client_id: &str, client_secret: &str) -> AuthResult<Option<Vec<String>>>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone)]
struct StoredAccount {
    id: Uuid,
    password: String,
}

/// Credential store backed by process memory
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<String, StoredAccount>>,
    refresh_tokens: RwLock<HashMap<String, RefreshTokenRecord>>,
    clients: RwLock<HashMap<String, (String, Vec<String>)>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account; returns its id
    pub async fn add_account(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.accounts.write().await.insert(
            email.to_string(),
            StoredAccount {
                id,
                password: password.to_string(),
            },
        );
        id
    }

    /// Register a service client with the scopes it may request
    pub async fn add_client(&self, client_id: &str, client_secret: &str, scopes: &[&str]) {
        self.clients.write().await.insert(
            client_id.to_string(),
            (
                client_secret.to_string(),
                scopes.iter().map(|s| s.to_string()).collect(),
            ),
        );
    }

    /// Number of refresh tokens stored
    pub async fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn store_refresh_token(
        &self,
        email: &str,
        password: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let accounts = self.accounts.read().await;
        let Some(account) = accounts.get(email).filter(|a| a.password == password) else {
            return Ok(false);
        };

        self.refresh_tokens.write().await.insert(
            refresh_token.to_string(),
            RefreshTokenRecord {
                account_id: account.id,
                email: email.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn find_refresh_token(&self, refresh_token: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self.refresh_tokens.read().await.get(refresh_token).cloned())
    }

    async fn find_client_scopes(&self, client_id: &str, client_secret: &str) -> AuthResult<Option<Vec<String>>> {
        Ok(self
            .clients
            .read()
            .await
            .get(client_id)
            .filter(|(secret, _)| secret == client_secret)
            .map(|(_, scopes)| scopes.clone()))
    }
}

// =============================================================================
// Verifier
// =============================================================================

/// Authenticates credentials and issues token pairs
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    config: TokenConfig,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec, config: TokenConfig) -> Self {
        Self { store, codec, config }
    }

    /// Exchange an email and password for a token pair.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`. A
    /// store failure yields `Internal` and no tokens.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let refresh_token = self.generate_refresh_token();
        let refresh_expires_at = expiry_after(now, self.config.refresh_token_lifetime)?;

        let matched = self
            .with_store_deadline(
                self.store
                    .store_refresh_token(email, password, &refresh_token, refresh_expires_at),
            )
            .await
            .map_err(|e| internal_unless_timeout(e, "refresh token persistence failed"))?;

        if !matched {
            warn!(email = %email, "Authentication failed");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issue_pair(email, refresh_token, refresh_expires_at, now)?;

        info!(
            email = %email,
            token = %fingerprint(&pair.access_token),
            "User authenticated"
        );

        Ok(pair)
    }

    /// Exchange a refresh token for a fresh access token. The refresh token
    /// itself is returned unchanged.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let record = self
            .with_store_deadline(self.store.find_refresh_token(refresh_token))
            .await
            .map_err(|e| internal_unless_timeout(e, "refresh token lookup failed"))?
            .ok_or(AuthError::InvalidCredentials)?;

        if record.is_expired_at(now) {
            warn!(account_id = %record.account_id, "Expired refresh token presented");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issue_pair(&record.email, record.refresh_token, record.expires_at, now)?;

        info!(account_id = %record.account_id, "Access token refreshed");

        Ok(pair)
    }

    /// Client-credentials grant: exchange a client id and secret for an
    /// access token. `scope` must be one of the client's granted scopes; it
    /// is checked here and not carried in the token. No refresh token is
    /// issued.
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> AuthResult<ClientToken> {
        if client_id.is_empty() || client_secret.is_empty() || scope.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let granted = self
            .with_store_deadline(self.store.find_client_scopes(client_id, client_secret))
            .await
            .map_err(|e| internal_unless_timeout(e, "client lookup failed"))?;

        if !granted.is_some_and(|scopes| scopes.iter().any(|s| s == scope)) {
            warn!(client_id = %client_id, scope = %scope, "Client authentication failed");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let lifetime = self.config.access_token_lifetime;
        let access_token = self.codec.issue_at(client_id, lifetime, now)?;
        let expires_at = expiry_after(now, lifetime)?;

        info!(client_id = %client_id, scope = %scope, "Client token issued");

        Ok(ClientToken {
            access_token,
            expires_in: (expires_at - now).num_seconds(),
            token_type: "Bearer".to_string(),
        })
    }

    fn issue_pair(
        &self,
        email: &str,
        refresh_token: String,
        refresh_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<TokenPair> {
        let lifetime = self.config.access_token_lifetime;
        let access_token = self.codec.issue_at(email, lifetime, now)?;
        let access_expires_at = expiry_after(now, lifetime)?;

        Ok(TokenPair::new(
            access_token,
            refresh_token,
            access_expires_at.timestamp(),
            refresh_expires_at.timestamp(),
        ))
    }

    async fn with_store_deadline<T>(&self, fut: impl Future<Output = AuthResult<T>>) -> AuthResult<T> {
        let deadline = self.config.store_timeout;
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(deadline = ?deadline, "Credential store deadline exceeded");
                Err(AuthError::Timeout("credential store"))
            }
        }
    }

    /// Generate a cryptographically secure refresh token
    fn generate_refresh_token(&self) -> String {
        let mut bytes = vec![0u8; self.config.refresh_token_length];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, &bytes)
    }
}

fn internal_unless_timeout(err: AuthError, context: &str) -> AuthError {
    match err {
        AuthError::Timeout(_) => err,
        e => AuthError::Internal(format!("{}: {}", context, e)),
    }
}
