//! Balance Ledger
//!
//! Orchestrates a balance change: resolve the caller, pre-check funds for
//! withdrawals, settle with the card gateway, then apply the change and its
//! record in one storage transaction. Nothing is written unless settlement
//! succeeded.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use vaultpay_auth::{token::fingerprint, SubjectResolver};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::gateway::{GatewayOutcome, SettlementGateway};
use crate::store::LedgerStore;
use crate::types::{CardDetails, Receipt, SubjectKey, TransactionKind, TransactionRecord};

const REPLENISHED: &str = "Balance successfully replenished";
const WITHDRAWN: &str = "Balance successfully withdrawn";

/// The balance ledger
#[derive(Clone)]
pub struct BalanceLedger {
    resolver: Arc<dyn SubjectResolver>,
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn SettlementGateway>,
    config: LedgerConfig,
}

impl BalanceLedger {
    pub fn new(
        resolver: Arc<dyn SubjectResolver>,
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn SettlementGateway>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            resolver,
            store,
            gateway,
            config,
        }
    }

    /// Charge the card and credit the caller's balance
    pub async fn replenish(&self, access_token: &str, card: &CardDetails, amount: i64) -> LedgerResult<Receipt> {
        ensure_positive(amount)?;
        let subject = self.resolve(access_token).await?;
        let key = SubjectKey::from_subject(&subject);

        let outcome = self.settle(TransactionKind::Deposit, card, amount).await?;
        self.check_outcome(&key, TransactionKind::Deposit, card, amount, outcome)?;

        let balance_after = self
            .with_store_deadline(self.store.deposit(&key, amount))
            .await
            .map_err(|e| {
                error!(
                    subject_key = %key,
                    amount,
                    card = %card.masked_number(),
                    error = %e,
                    "Card charged but deposit was not applied"
                );
                e
            })?;

        info!(subject_key = %key, amount, balance_after, "Balance replenished");
        Ok(receipt(subject, TransactionKind::Deposit, amount, balance_after, REPLENISHED))
    }

    /// Pay out to the card and debit the caller's balance
    pub async fn withdraw(&self, access_token: &str, card: &CardDetails, amount: i64) -> LedgerResult<Receipt> {
        ensure_positive(amount)?;
        let subject = self.resolve(access_token).await?;
        let key = SubjectKey::from_subject(&subject);

        let balance = self.with_store_deadline(self.store.balance(&key)).await?;
        if balance < amount {
            info!(subject_key = %key, amount, balance, "Withdrawal exceeds balance");
            return Err(LedgerError::NotEnoughMoney);
        }

        let outcome = self.settle(TransactionKind::Withdrawal, card, amount).await?;
        self.check_outcome(&key, TransactionKind::Withdrawal, card, amount, outcome)?;

        let debited = self
            .with_store_deadline(self.store.withdraw(&key, amount))
            .await
            .map_err(|e| {
                error!(
                    subject_key = %key,
                    amount,
                    card = %card.masked_number(),
                    error = %e,
                    "Card credited but debit was not applied"
                );
                e
            })?;

        let Some(balance_after) = debited else {
            error!(
                subject_key = %key,
                amount,
                card = %card.masked_number(),
                "Card credited but balance no longer covers the withdrawal; reconciliation required"
            );
            return Err(LedgerError::Internal(
                "conditional debit matched no account after settlement".to_string(),
            ));
        };

        info!(subject_key = %key, amount, balance_after, "Balance withdrawn");
        Ok(receipt(subject, TransactionKind::Withdrawal, amount, balance_after, WITHDRAWN))
    }

    /// Current balance of the caller
    pub async fn balance(&self, access_token: &str) -> LedgerResult<i64> {
        let subject = self.resolve(access_token).await?;
        let key = SubjectKey::from_subject(&subject);
        self.with_store_deadline(self.store.balance(&key)).await
    }

    /// Most recent records of the caller, newest first. `limit` defaults to
    /// the configured page size.
    pub async fn history(&self, access_token: &str, limit: Option<i64>) -> LedgerResult<Vec<TransactionRecord>> {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(self.config.history_limit)
            .min(self.config.history_limit);
        let subject = self.resolve(access_token).await?;
        let key = SubjectKey::from_subject(&subject);
        self.with_store_deadline(self.store.history(&key, limit)).await
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    async fn resolve(&self, access_token: &str) -> LedgerResult<String> {
        let resolved = with_deadline(self.config.store_timeout, "subject resolution", async {
            self.resolver.resolve(access_token).await.map_err(LedgerError::from)
        })
        .await;

        match resolved {
            Ok(claims) => Ok(claims.subject),
            Err(e) => {
                warn!(token = %fingerprint(access_token), error = %e, "Subject resolution failed");
                Err(e)
            }
        }
    }

    async fn settle(&self, kind: TransactionKind, card: &CardDetails, amount: i64) -> LedgerResult<GatewayOutcome> {
        with_deadline(self.config.settlement_timeout, "settlement", async {
            let result = match kind {
                TransactionKind::Deposit => self.gateway.charge(card, amount).await,
                TransactionKind::Withdrawal => self.gateway.credit(card, amount).await,
            };
            result.map_err(|e| {
                warn!(card = %card.masked_number(), error = %e, "Gateway unreachable");
                LedgerError::PaymentFailed { body: e.to_string() }
            })
        })
        .await
    }

    fn check_outcome(
        &self,
        key: &SubjectKey,
        kind: TransactionKind,
        card: &CardDetails,
        amount: i64,
        outcome: GatewayOutcome,
    ) -> LedgerResult<()> {
        match outcome {
            GatewayOutcome::Success => Ok(()),
            GatewayOutcome::InvalidCredentials => {
                info!(subject_key = %key, %kind, card = %card.masked_number(), "Gateway rejected card");
                Err(LedgerError::InvalidCardCredentials)
            }
            GatewayOutcome::InsufficientFunds => {
                info!(subject_key = %key, %kind, amount, "Gateway reported insufficient card funds");
                Err(LedgerError::NotEnoughMoney)
            }
            GatewayOutcome::Unknown(body) => {
                warn!(subject_key = %key, %kind, amount, body = %body, "Payment failed");
                Err(LedgerError::PaymentFailed { body })
            }
        }
    }

    async fn with_store_deadline<T>(&self, fut: impl Future<Output = LedgerResult<T>>) -> LedgerResult<T> {
        with_deadline(self.config.store_timeout, "store", fut).await
    }
}

async fn with_deadline<T>(
    deadline: Duration,
    what: &'static str,
    fut: impl Future<Output = LedgerResult<T>>,
) -> LedgerResult<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation = what, deadline = ?deadline, "Deadline exceeded");
            Err(LedgerError::Timeout(what))
        }
    }
}

fn ensure_positive(amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

fn receipt(subject: String, kind: TransactionKind, amount: i64, balance_after: i64, message: &str) -> Receipt {
    Receipt {
        subject,
        kind,
        amount,
        balance_after,
        created_at: Utc::now(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayCall, GatewayError, InMemoryGateway};
    use crate::store::InMemoryLedgerStore;
    use async_trait::async_trait;
    use vaultpay_auth::{TokenCache, TokenCodec, TokenResolver};

    const SECRET: &str = "ledger-test-secret-key-32-bytes-long!!";
    const ALICE: &str = "alice@example.com";

    struct Harness {
        ledger: BalanceLedger,
        store: InMemoryLedgerStore,
        gateway: Arc<InMemoryGateway>,
        codec: TokenCodec,
    }

    impl Harness {
        fn new(outcome: GatewayOutcome) -> Self {
            Self::with_gateway(Arc::new(InMemoryGateway::new(outcome)))
        }

        fn with_gateway(gateway: Arc<InMemoryGateway>) -> Self {
            let codec = TokenCodec::new(SECRET).unwrap();
            let resolver = Arc::new(TokenResolver::new(
                codec.clone(),
                TokenCache::new(Duration::from_secs(300)),
            ));
            let store = InMemoryLedgerStore::new();
            let ledger = BalanceLedger::new(
                resolver,
                Arc::new(store.clone()),
                gateway.clone(),
                LedgerConfig::default(),
            );
            Self {
                ledger,
                store,
                gateway,
                codec,
            }
        }

        fn token(&self, subject: &str) -> String {
            self.codec.issue(subject, Duration::from_secs(600)).unwrap()
        }
    }

    fn card() -> CardDetails {
        CardDetails::new("4111111111111111", "Alice", "123")
    }

    #[tokio::test]
    async fn test_withdraw_scenario() {
        let h = Harness::new(GatewayOutcome::Success);
        let token = h.token(ALICE);
        h.store.set_balance(&SubjectKey::from_subject(ALICE), 100).await;

        let receipt = h.ledger.withdraw(&token, &card(), 50).await.unwrap();
        assert_eq!(receipt.balance_after, 50);
        assert_eq!(receipt.message, "Balance successfully withdrawn");
        assert_eq!(h.ledger.balance(&token).await.unwrap(), 50);

        let records = h.store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, 50);
        assert_eq!(records[0].kind, TransactionKind::Withdrawal);

        let result = h.ledger.withdraw(&token, &card(), 200).await;
        assert!(matches!(result, Err(LedgerError::NotEnoughMoney)));
        assert_eq!(h.ledger.balance(&token).await.unwrap(), 50);
        assert_eq!(h.store.records().await.len(), 1);
        assert_eq!(h.gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_withdraw_without_account_never_calls_gateway() {
        let h = Harness::new(GatewayOutcome::Success);
        let result = h.ledger.withdraw(&h.token(ALICE), &card(), 1).await;
        assert!(matches!(result, Err(LedgerError::NotEnoughMoney)));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_replenish_creates_account() {
        let h = Harness::new(GatewayOutcome::Success);
        let token = h.token(ALICE);

        let receipt = h.ledger.replenish(&token, &card(), 75).await.unwrap();
        assert_eq!(receipt.balance_after, 75);
        assert_eq!(receipt.kind, TransactionKind::Deposit);
        assert_eq!(receipt.message, "Balance successfully replenished");
        assert_eq!(h.gateway.calls(), vec![(GatewayCall::Charge, card().number, 75)]);

        let history = h.ledger.history(&token, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Deposit);
    }

    #[tokio::test]
    async fn test_gateway_rejections_leave_no_record() {
        let cases = [
            (GatewayOutcome::InvalidCredentials, "INVALID_CARD_CREDENTIALS"),
            (GatewayOutcome::InsufficientFunds, "NOT_ENOUGH_MONEY"),
            (GatewayOutcome::Unknown("teapot".to_string()), "PAYMENT_FAILED"),
        ];

        for (outcome, code) in cases {
            let h = Harness::new(outcome);
            let token = h.token(ALICE);
            h.store.set_balance(&SubjectKey::from_subject(ALICE), 100).await;

            let err = h.ledger.replenish(&token, &card(), 10).await.unwrap_err();
            assert_eq!(err.error_code(), code);
            let err = h.ledger.withdraw(&token, &card(), 10).await.unwrap_err();
            assert_eq!(err.error_code(), code);

            assert!(h.store.records().await.is_empty());
            assert_eq!(h.ledger.balance(&token).await.unwrap(), 100);
        }
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_payment_failure() {
        let h = Harness::with_gateway(Arc::new(InMemoryGateway::unreachable("connection refused")));
        let err = h.ledger.replenish(&h.token(ALICE), &card(), 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::PaymentFailed { .. }));
        assert!(h.store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failures() {
        let h = Harness::new(GatewayOutcome::Success);

        let expired = h
            .codec
            .issue_at(ALICE, Duration::from_secs(1), Utc::now() - chrono::Duration::seconds(10))
            .unwrap();
        let err = h.ledger.replenish(&expired, &card(), 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::Expired));

        let forged = TokenCodec::new("another-secret-key-that-is-32-bytes!!")
            .unwrap()
            .issue(ALICE, Duration::from_secs(60))
            .unwrap();
        let err = h.ledger.withdraw(&forged, &card(), 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCredentials));

        let err = h.ledger.balance("garbage").await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCredentials));

        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let h = Harness::new(GatewayOutcome::Success);
        let token = h.token(ALICE);
        for amount in [0, -5] {
            let err = h.ledger.replenish(&token, &card(), amount).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(a) if a == amount));
        }
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_withdrawals_never_overdraw() {
        let h = Harness::new(GatewayOutcome::Success);
        let token = h.token(ALICE);
        h.store.set_balance(&SubjectKey::from_subject(ALICE), 100).await;

        let attempts = (0..10).map(|_| {
            let ledger = h.ledger.clone();
            let token = token.clone();
            async move { ledger.withdraw(&token, &card(), 30).await }
        });
        let results = futures::future::join_all(attempts).await;

        let succeeded = results.iter().filter(|r| r.is_ok()).count() as i64;
        let balance = h.ledger.balance(&token).await.unwrap();
        assert!(balance >= 0);
        assert_eq!(balance, 100 - 30 * succeeded);
        assert_eq!(h.store.records().await.len() as i64, succeeded);
    }

    struct StalledGateway;

    #[async_trait]
    impl SettlementGateway for StalledGateway {
        async fn charge(&self, _card: &CardDetails, _amount: i64) -> Result<GatewayOutcome, GatewayError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(GatewayOutcome::Success)
        }

        async fn credit(&self, card: &CardDetails, amount: i64) -> Result<GatewayOutcome, GatewayError> {
            self.charge(card, amount).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_settlement_deadline() {
        let codec = TokenCodec::new(SECRET).unwrap();
        let store = InMemoryLedgerStore::new();
        let ledger = BalanceLedger::new(
            Arc::new(TokenResolver::new(codec.clone(), TokenCache::new(Duration::from_secs(300)))),
            Arc::new(store.clone()),
            Arc::new(StalledGateway),
            LedgerConfig::default(),
        );
        let token = codec.issue(ALICE, Duration::from_secs(600)).unwrap();

        let err = ledger.replenish(&token, &card(), 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout("settlement")));
        assert_eq!(err.status_code(), 500);
        assert!(store.records().await.is_empty());
    }
}
