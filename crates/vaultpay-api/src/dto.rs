//! Request forms and response bodies
//!
//! Form fields default to empty so that a missing field and an empty one
//! are rejected the same way.

use serde::{Deserialize, Serialize};
use vaultpay_auth::{ClientToken, TokenClaims, TokenPair};

use crate::error::ApiError;

/// `POST /token`, either `email` + `password` or the client-credentials
/// grant `client_id` + `client_secret` + `scope`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenForm {
    pub email: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

impl TokenForm {
    /// Any client-credentials field selects the client grant
    pub fn is_client_grant(&self) -> bool {
        !self.client_id.is_empty() || !self.client_secret.is_empty() || !self.scope.is_empty()
    }
}

/// `POST /refresh`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshForm {
    pub refresh_token: String,
}

/// `POST /api/balance`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplenishForm {
    pub access_token: String,
    pub card_number: String,
    pub card_owner: String,
    pub cvv: String,
    pub money: String,
}

/// `POST /api/withdrawal`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WithdrawalForm {
    pub access_token: String,
    pub card_number: String,
    pub money: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
        }
    }
}

/// Client-credentials grant response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<ClientToken> for ClientTokenResponse {
    fn from(token: ClientToken) -> Self {
        Self {
            access_token: token.access_token,
            expires_in: token.expires_in,
            token_type: token.token_type,
        }
    }
}

/// `GET /check` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    /// Subject the token was issued to: a client id or an account email
    pub client_id: String,
    pub valid: bool,
    pub expires_at: i64,
}

impl From<TokenClaims> for CheckResponse {
    fn from(claims: TokenClaims) -> Self {
        Self {
            client_id: claims.subject,
            valid: true,
            expires_at: claims.exp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Fail with `MissingParameters` if any field is empty
pub fn require(fields: &[&str]) -> Result<(), ApiError> {
    if fields.iter().any(|f| f.is_empty()) {
        return Err(ApiError::MissingParameters);
    }
    Ok(())
}

/// Parse the `money` field as a whole number
pub fn parse_money(money: &str) -> Result<i64, ApiError> {
    money.parse::<i64>().map_err(|_| ApiError::InvalidMoneyValue)
}
