//! API Routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// Token issuance and validation routes, rate limited per client address
pub fn token_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/token",
            post(handlers::auth::issue_token).fallback(handlers::method_not_allowed),
        )
        .route(
            "/refresh",
            post(handlers::auth::refresh_token).fallback(handlers::method_not_allowed),
        )
        .route(
            "/check",
            get(handlers::auth::check_token).fallback(handlers::method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::rate_limit_middleware,
        ))
}

/// Balance routes
pub fn balance_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/balance",
            post(handlers::balance::replenish).fallback(handlers::method_not_allowed),
        )
        .route(
            "/withdrawal",
            post(handlers::balance::withdraw).fallback(handlers::method_not_allowed),
        )
}

/// Health routes
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/health",
        get(handlers::health::health_check).fallback(handlers::method_not_allowed),
    )
}
