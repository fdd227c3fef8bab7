//! Balance Handlers

use axum::{
    extract::{rejection::FormRejection, State},
    Form, Json,
};
use std::sync::Arc;
use vaultpay_ledger::CardDetails;

use crate::dto::{parse_money, require, MessageResponse, ReplenishForm, WithdrawalForm};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Charge a card and credit the caller's balance
pub async fn replenish(
    State(state): State<Arc<AppState>>,
    form: Result<Form<ReplenishForm>, FormRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Form(form) = form.map_err(|_| ApiError::BadRequest)?;
    require(&[
        &form.access_token,
        &form.card_number,
        &form.card_owner,
        &form.cvv,
        &form.money,
    ])?;
    let amount = parse_money(&form.money)?;

    let card = CardDetails::new(form.card_number, form.card_owner, form.cvv);
    let receipt = state.ledger.replenish(&form.access_token, &card, amount).await?;

    Ok(Json(MessageResponse {
        message: receipt.message,
    }))
}

/// Pay out to a card and debit the caller's balance
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    form: Result<Form<WithdrawalForm>, FormRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Form(form) = form.map_err(|_| ApiError::BadRequest)?;
    require(&[&form.access_token, &form.card_number, &form.money])?;
    let amount = parse_money(&form.money)?;

    let card = CardDetails::number_only(form.card_number);
    let receipt = state.ledger.withdraw(&form.access_token, &card, amount).await?;

    Ok(Json(MessageResponse {
        message: receipt.message,
    }))
}
