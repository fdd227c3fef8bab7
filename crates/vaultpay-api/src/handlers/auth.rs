//! Token Handlers
//!
//! Form-encoded endpoints that issue and refresh bearer tokens, and a
//! header-authenticated endpoint that validates them.

use axum::{
    extract::{rejection::FormRejection, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use std::sync::Arc;

use crate::dto::{require, CheckResponse, ClientTokenResponse, RefreshForm, TokenForm, TokenResponse};
use crate::error::{ApiError, ApiResult};
use crate::extractors::BearerToken;
use crate::state::AppState;

/// Exchange email and password for a token pair, or client credentials
/// for an access token
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> ApiResult<Response> {
    let Form(form) = form.map_err(|_| ApiError::BadRequest)?;

    if form.is_client_grant() {
        require(&[&form.client_id, &form.client_secret, &form.scope])?;
        let token = state
            .auth
            .client_token(&form.client_id, &form.client_secret, &form.scope)
            .await?;
        return Ok(Json(ClientTokenResponse::from(token)).into_response());
    }

    require(&[&form.email, &form.password])?;
    let pair = state.auth.login(&form.email, &form.password).await?;
    Ok(Json(TokenResponse::from(pair)).into_response())
}

/// Exchange a refresh token for a new access token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    form: Result<Form<RefreshForm>, FormRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Form(form) = form.map_err(|_| ApiError::BadRequest)?;
    require(&[&form.refresh_token])?;

    let pair = state.auth.refresh(&form.refresh_token).await?;
    Ok(Json(pair.into()))
}

/// Validate the bearer token from the `Authorization` header
pub async fn check_token(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> ApiResult<Json<CheckResponse>> {
    let claims = state.auth.check(&token).await?;
    Ok(Json(claims.into()))
}
