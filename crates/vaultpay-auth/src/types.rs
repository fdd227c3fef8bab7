//! Authentication types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access token / refresh token pair returned at login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Signed access token
    pub access_token: String,
    /// Opaque refresh token
    pub refresh_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Access token expiry (Unix timestamp)
    pub expires_at: i64,
    /// Refresh token expiry (Unix timestamp)
    #[serde(skip_serializing)]
    pub refresh_expires_at: i64,
}

impl TokenPair {
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_at: i64,
        refresh_expires_at: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_at,
            refresh_expires_at,
        }
    }
}

/// Claims carried in the access token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject identity (the account email for locally issued tokens)
    #[serde(rename = "sub", alias = "email")]
    pub subject: String,
    /// Expiry (Unix timestamp, seconds)
    pub exp: i64,
    /// Issued at (Unix timestamp, seconds)
    #[serde(default)]
    pub iat: i64,
}

impl TokenClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Expired at or after `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Access token issued through the client-credentials grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientToken {
    pub access_token: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub token_type: String,
}

/// Cache entry for a resolved access token
#[derive(Debug, Clone)]
pub struct CachedTokenEntry {
    pub token: String,
    pub claims: TokenClaims,
    pub expires_at: DateTime<Utc>,
}

/// Stored refresh token with the owning account
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub account_id: Uuid,
    pub email: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl From<vaultpay_db::DbRefreshToken> for RefreshTokenRecord {
    fn from(row: vaultpay_db::DbRefreshToken) -> Self {
        Self {
            account_id: row.user_id,
            email: row.email,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_is_bearer() {
        let pair = TokenPair::new("a".into(), "r".into(), 10, 20);
        assert_eq!(pair.token_type, "Bearer");
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert!(json.get("refresh_expires_at").is_none());
    }

    #[test]
    fn test_claims_accept_legacy_email_key() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"email":"a@b.c","exp":100}"#).unwrap();
        assert_eq!(claims.subject, "a@b.c");
        assert_eq!(claims.iat, 0);
    }

    #[test]
    fn test_claims_expiry_is_inclusive() {
        let claims = TokenClaims { subject: "s".into(), exp: 1_000, iat: 0 };
        assert!(!claims.is_expired_at(Utc.timestamp_opt(999, 0).unwrap()));
        assert!(claims.is_expired_at(Utc.timestamp_opt(1_000, 0).unwrap()));
    }
}
