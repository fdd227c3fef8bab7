//! Settlement Gateway Client
//!
//! Calls the external card-processing service and classifies its reply.
//! One request per call; there are no retries.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::types::CardDetails;

/// Classified gateway response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Success,
    InvalidCredentials,
    InsufficientFunds,
    /// Anything else; carries the response body for diagnostics
    Unknown(String),
}

/// The gateway could not be reached or its body could not be read
#[derive(Debug, Error)]
#[error("gateway transport failure: {0}")]
pub struct GatewayError(pub String);

/// Card settlement operations
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Charge `amount` to the card
    async fn charge(&self, card: &CardDetails, amount: i64) -> Result<GatewayOutcome, GatewayError>;

    /// Pay `amount` out to the card
    async fn credit(&self, card: &CardDetails, amount: i64) -> Result<GatewayOutcome, GatewayError>;
}

/// Classify a gateway reply by status code and body text
pub fn classify(status: u16, body: &str) -> GatewayOutcome {
    match status {
        200 => GatewayOutcome::Success,
        400 if body.contains("Invalid Credentials") => GatewayOutcome::InvalidCredentials,
        400 if body.contains("Not enough money") => GatewayOutcome::InsufficientFunds,
        _ => GatewayOutcome::Unknown(body.to_string()),
    }
}

// =============================================================================
// HTTP gateway
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChargeRequest<'a> {
    card_number: &'a str,
    card_owner_name: &'a str,
    cvv: &'a str,
    payment_amount: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreditRequest<'a> {
    card_number: &'a str,
    payment_amount: i64,
}

/// Gateway client speaking JSON over HTTP
#[derive(Clone)]
pub struct HttpSettlementGateway {
    client: reqwest::Client,
    charge_url: String,
    credit_url: String,
}

impl HttpSettlementGateway {
    pub fn new(charge_url: impl Into<String>, credit_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            charge_url: charge_url.into(),
            credit_url: credit_url.into(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.charge_url.clone(), config.credit_url.clone())
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, body: &T) -> Result<GatewayOutcome, GatewayError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError(format!("failed to read response body: {}", e)))?;
        let text = text.trim();

        let outcome = classify(status, text);
        if let GatewayOutcome::Unknown(_) = &outcome {
            warn!(status, body = %text, "Unclassified gateway response");
        } else {
            debug!(status, outcome = ?outcome, "Gateway responded");
        }
        Ok(outcome)
    }
}

#[async_trait]
impl SettlementGateway for HttpSettlementGateway {
    async fn charge(&self, card: &CardDetails, amount: i64) -> Result<GatewayOutcome, GatewayError> {
        let request = ChargeRequest {
            card_number: &card.number,
            card_owner_name: &card.owner,
            cvv: &card.cvv,
            payment_amount: amount,
        };
        self.post(&self.charge_url, &request).await
    }

    async fn credit(&self, card: &CardDetails, amount: i64) -> Result<GatewayOutcome, GatewayError> {
        let request = CreditRequest {
            card_number: &card.number,
            payment_amount: amount,
        };
        self.post(&self.credit_url, &request).await
    }
}

// =============================================================================
// In-memory gateway
// =============================================================================

/// Which gateway operation was called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCall {
    Charge,
    Credit,
}

/// Gateway that answers every call with a configured outcome and records
/// the calls it received
pub struct InMemoryGateway {
    outcome: Mutex<Result<GatewayOutcome, String>>,
    calls: Mutex<Vec<(GatewayCall, String, i64)>>,
}

impl InMemoryGateway {
    pub fn new(outcome: GatewayOutcome) -> Self {
        Self {
            outcome: Mutex::new(Ok(outcome)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Gateway whose every call fails at the transport level
    pub fn unreachable(reason: &str) -> Self {
        Self {
            outcome: Mutex::new(Err(reason.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_outcome(&self, outcome: GatewayOutcome) {
        if let Ok(mut current) = self.outcome.lock() {
            *current = Ok(outcome);
        }
    }

    /// Calls received so far as (operation, card number, amount)
    pub fn calls(&self) -> Vec<(GatewayCall, String, i64)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn answer(&self, call: GatewayCall, card: &CardDetails, amount: i64) -> Result<GatewayOutcome, GatewayError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((call, card.number.clone(), amount));
        }
        match self.outcome.lock() {
            Ok(outcome) => outcome.clone().map_err(GatewayError),
            Err(_) => Err(GatewayError("gateway state poisoned".to_string())),
        }
    }
}

#[async_trait]
impl SettlementGateway for InMemoryGateway {
    async fn charge(&self, card: &CardDetails, amount: i64) -> Result<GatewayOutcome, GatewayError> {
        self.answer(GatewayCall::Charge, card, amount)
    }

    async fn credit(&self, card: &CardDetails, amount: i64) -> Result<GatewayOutcome, GatewayError> {
        self.answer(GatewayCall::Credit, card, amount)
    }
}
