//! Ledger error types

use thiserror::Error;
use vaultpay_auth::AuthError;
use vaultpay_db::DbError;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors surfaced by the balance ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Access token rejected or subject unknown
    #[error("Invalid user credentials")]
    InvalidCredentials,

    /// Access token has expired
    #[error("Token has expired")]
    Expired,

    /// Ledger balance or card balance does not cover the amount
    #[error("Not enough money")]
    NotEnoughMoney,

    /// Gateway rejected the card details
    #[error("Invalid card credentials")]
    InvalidCardCredentials,

    /// Gateway returned an unclassified response or could not be reached
    #[error("Payment failed: {body}")]
    PaymentFailed { body: String },

    /// Amount is zero or negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// A store or gateway call exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(&'static str),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount(_) => 400,

            Self::InvalidCredentials
            | Self::Expired
            | Self::NotEnoughMoney
            | Self::InvalidCardCredentials => 401,

            Self::PaymentFailed { .. }
            | Self::Timeout(_)
            | Self::Storage(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Get an error code for the client (safe to expose)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Expired => "TOKEN_EXPIRED",
            Self::NotEnoughMoney => "NOT_ENOUGH_MONEY",
            Self::InvalidCardCredentials => "INVALID_CARD_CREDENTIALS",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::PaymentFailed { .. } => "PAYMENT_FAILED",
            Self::Timeout(_) | Self::Storage(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get safe message for client (doesn't leak internal details)
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidCredentials | Self::Expired => "Invalid user credentials".to_string(),
            Self::NotEnoughMoney => "Not enough money on the card".to_string(),
            Self::InvalidCardCredentials => "Invalid card credentials".to_string(),
            Self::InvalidAmount(_) => "Invalid money value".to_string(),
            Self::PaymentFailed { .. } | Self::Timeout(_) | Self::Storage(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<AuthError> for LedgerError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Expired => Self::Expired,
            AuthError::Timeout(what) => Self::Timeout(what),
            e if e.is_token_rejection() => Self::InvalidCredentials,
            e => Self::Internal(format!("subject resolution failed: {}", e)),
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        Self::Storage(err.to_string())
    }
}
