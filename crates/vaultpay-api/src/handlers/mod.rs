//! API Handlers

pub mod auth;
pub mod balance;
pub mod health;

use crate::error::ApiError;

/// Fallback for a known path called with the wrong method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Fallback for unknown paths
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
