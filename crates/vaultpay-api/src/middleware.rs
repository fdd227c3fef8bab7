//! API Middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::sync::Arc;

use crate::error::ApiError;
use crate::extractors::ClientIp;
use crate::state::AppState;

/// Per-address rate limiting for the token endpoints
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.auth.rate_limiter.check_ip_limit(&ip).await?;
    Ok(next.run(req).await)
}

/// Turn a handler panic into a 500 `{"error": ...}` response
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    tracing::error!(panic = %detail, "Recovered from handler panic");
    ApiError::Internal.into_response()
}
