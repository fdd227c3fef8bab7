//! Authentication error types
//!
//! Errors are designed to be:
//! - Informative for logging/debugging
//! - Safe for external exposure (no sensitive data leakage)
//! - Convertible to HTTP status codes

use thiserror::Error;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    // =========================================================================
    // Token Errors
    // =========================================================================
    /// Token does not have three non-empty base64url segments, or a segment
    /// does not decode
    #[error("Malformed token")]
    MalformedToken,

    /// Recomputed signature does not match
    #[error("Invalid signature")]
    InvalidSignature,

    /// Token expiry has been reached
    #[error("Token has expired")]
    Expired,

    // =========================================================================
    // Credential Errors
    // =========================================================================
    /// Unknown email, wrong password, or unknown/expired refresh token
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Too many requests from one client address
    #[error("Too many requests")]
    RateLimitExceeded { retry_after: u64 },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Signing secret is missing
    #[error("Token secret is not configured")]
    SecretNotConfigured,

    /// Credential store call exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(&'static str),

    /// Credential store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Identity service lookup failed
    #[error("Identity service error: {0}")]
    Identity(String),

    /// Internal error (should not be exposed to clients)
    #[error("Internal error")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 401 Unauthorized
            Self::MalformedToken
            | Self::InvalidSignature
            | Self::Expired
            | Self::InvalidCredentials => 401,

            // 429 Too Many Requests
            Self::RateLimitExceeded { .. } => 429,

            // 500 Internal Server Error
            Self::SecretNotConfigured
            | Self::Timeout(_)
            | Self::Store(_)
            | Self::Identity(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Get an error code for the client (safe to expose)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedToken => "MALFORMED_TOKEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Expired => "TOKEN_EXPIRED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::SecretNotConfigured
            | Self::Timeout(_)
            | Self::Store(_)
            | Self::Identity(_)
            | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the token itself was rejected, as opposed to an
    /// infrastructure failure while checking it
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken | Self::InvalidSignature | Self::Expired | Self::InvalidCredentials
        )
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Get safe message for client (doesn't leak internal details)
    pub fn client_message(&self) -> String {
        match self {
            Self::SecretNotConfigured
            | Self::Timeout(_)
            | Self::Store(_)
            | Self::Identity(_)
            | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<vaultpay_db::DbError> for AuthError {
    fn from(err: vaultpay_db::DbError) -> Self {
        Self::Store(err.to_string())
    }
}
