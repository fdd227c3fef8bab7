//! API error handling
//!
//! Every failure is rendered as `{"error": "<message>"}` with a fixed status.
//! Messages never carry internal details; those go to the log.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vaultpay_auth::AuthError;
use vaultpay_ledger::LedgerError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Not found")]
    NotFound,

    /// Body could not be parsed as a form
    #[error("Bad request")]
    BadRequest,

    #[error("Missing required parameters")]
    MissingParameters,

    #[error("Invalid money value")]
    InvalidMoneyValue,

    #[error("Authorization header is missing or format is incorrect")]
    MissingAuthorization,

    /// A handler panicked
    #[error("Internal server error")]
    Internal,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest | Self::MissingParameters | Self::InvalidMoneyValue => StatusCode::BAD_REQUEST,
            Self::MissingAuthorization => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(e) => to_status(e.status_code()),
            Self::Ledger(e) => to_status(e.status_code()),
        }
    }

    /// Message returned to the client
    pub fn client_message(&self) -> String {
        match self {
            Self::Auth(e) => e.client_message(),
            Self::Ledger(e) => e.client_message(),
            other => other.to_string(),
        }
    }
}

fn to_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let retry_after = match &self {
            Self::Auth(AuthError::RateLimitExceeded { retry_after }) => Some(*retry_after),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.client_message(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_statuses_and_messages() {
        let cases = [
            (LedgerError::NotEnoughMoney, 401, "Not enough money on the card"),
            (LedgerError::InvalidCardCredentials, 401, "Invalid card credentials"),
            (LedgerError::Expired, 401, "Invalid user credentials"),
            (LedgerError::InvalidAmount(-1), 400, "Invalid money value"),
            (LedgerError::Timeout("store"), 500, "Internal server error"),
        ];
        for (err, status, message) in cases {
            let err = ApiError::from(err);
            assert_eq!(err.status_code().as_u16(), status);
            assert_eq!(err.client_message(), message);
        }
    }

    #[test]
    fn test_auth_internal_error_is_hidden() {
        let err = ApiError::from(AuthError::Store("password=hunter2".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_request_errors() {
        assert_eq!(ApiError::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::MissingParameters.client_message(), "Missing required parameters");
        assert_eq!(ApiError::InvalidMoneyValue.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingAuthorization.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Internal.client_message(), "Internal server error");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::from(AuthError::RateLimitExceeded { retry_after: 3 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }
}
