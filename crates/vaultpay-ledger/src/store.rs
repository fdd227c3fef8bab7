//! Ledger storage
//!
//! Balances are integers keyed by [`SubjectKey`]. Each mutation applies the
//! balance change and appends its [`TransactionRecord`] atomically.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use vaultpay_db::BalanceRepo;

use crate::error::{LedgerError, LedgerResult};
use crate::types::{SubjectKey, TransactionKind, TransactionRecord};

/// Balance storage used by the ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance; a subject with no account has balance 0
    async fn balance(&self, key: &SubjectKey) -> LedgerResult<i64>;

    /// Credit the account (creating it if needed) and record a deposit.
    /// Returns the balance after the credit.
    async fn deposit(&self, key: &SubjectKey, amount: i64) -> LedgerResult<i64>;

    /// Debit the account only if its balance covers `amount`, recording a
    /// withdrawal. Returns `None` and changes nothing otherwise.
    async fn withdraw(&self, key: &SubjectKey, amount: i64) -> LedgerResult<Option<i64>>;

    /// Most recent records first
    async fn history(&self, key: &SubjectKey, limit: i64) -> LedgerResult<Vec<TransactionRecord>>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
struct MemoryState {
    balances: HashMap<SubjectKey, i64>,
    records: Vec<TransactionRecord>,
}

/// Store backed by process memory. A single lock covers balances and
/// records so every mutation is atomic.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account balance without writing a record
    pub async fn set_balance(&self, key: &SubjectKey, balance: i64) {
        self.state.write().await.balances.insert(key.clone(), balance);
    }

    /// Every record, oldest first
    pub async fn records(&self) -> Vec<TransactionRecord> {
        self.state.read().await.records.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn balance(&self, key: &SubjectKey) -> LedgerResult<i64> {
        Ok(self.state.read().await.balances.get(key).copied().unwrap_or(0))
    }

    async fn deposit(&self, key: &SubjectKey, amount: i64) -> LedgerResult<i64> {
        let mut state = self.state.write().await;
        let current = state.balances.get(key).copied().unwrap_or(0);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Storage("balance overflow".to_string()))?;

        state.balances.insert(key.clone(), updated);
        state.records.push(TransactionRecord {
            subject_key: key.to_string(),
            amount,
            kind: TransactionKind::Deposit,
            created_at: Utc::now(),
        });
        Ok(updated)
    }

    async fn withdraw(&self, key: &SubjectKey, amount: i64) -> LedgerResult<Option<i64>> {
        let mut state = self.state.write().await;
        let Some(current) = state.balances.get(key).copied() else {
            return Ok(None);
        };
        if current < amount {
            return Ok(None);
        }

        let updated = current - amount;
        state.balances.insert(key.clone(), updated);
        state.records.push(TransactionRecord {
            subject_key: key.to_string(),
            amount,
            kind: TransactionKind::Withdrawal,
            created_at: Utc::now(),
        });
        Ok(Some(updated))
    }

    async fn history(&self, key: &SubjectKey, limit: i64) -> LedgerResult<Vec<TransactionRecord>> {
        let state = self.state.read().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .records
            .iter()
            .rev()
            .filter(|r| r.subject_key == key.as_str())
            .take(limit)
            .cloned()
            .collect())
    }
}

// =============================================================================
// PostgreSQL store
// =============================================================================

/// Store backed by the `accounts` and `transactions` tables
#[derive(Clone)]
pub struct PgLedgerStore {
    repo: BalanceRepo,
}

impl PgLedgerStore {
    pub fn new(repo: BalanceRepo) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn balance(&self, key: &SubjectKey) -> LedgerResult<i64> {
        Ok(self.repo.get_balance(key.as_str()).await?)
    }

    async fn deposit(&self, key: &SubjectKey, amount: i64) -> LedgerResult<i64> {
        let account = self.repo.deposit(key.as_str(), amount).await?;
        Ok(account.balance)
    }

    async fn withdraw(&self, key: &SubjectKey, amount: i64) -> LedgerResult<Option<i64>> {
        let account = self.repo.withdraw(key.as_str(), amount).await?;
        Ok(account.map(|a| a.balance))
    }

    async fn history(&self, key: &SubjectKey, limit: i64) -> LedgerResult<Vec<TransactionRecord>> {
        self.repo
            .list_transactions(key.as_str(), limit)
            .await?
            .into_iter()
            .map(|row| TransactionRecord::try_from(row).map_err(LedgerError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> SubjectKey {
        SubjectKey::from_subject(s)
    }

    #[tokio::test]
    async fn test_missing_account_reads_zero() {
        let store = InMemoryLedgerStore::new();
        assert_eq!(store.balance(&key("nobody@example.com")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deposit_creates_account() {
        let store = InMemoryLedgerStore::new();
        let k = key("alice@example.com");
        assert_eq!(store.deposit(&k, 40).await.unwrap(), 40);
        assert_eq!(store.deposit(&k, 2).await.unwrap(), 42);
        assert_eq!(store.records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_withdraw_is_conditional() {
        let store = InMemoryLedgerStore::new();
        let k = key("alice@example.com");
        store.set_balance(&k, 30).await;

        assert_eq!(store.withdraw(&k, 31).await.unwrap(), None);
        assert_eq!(store.withdraw(&k, 30).await.unwrap(), Some(0));
        assert_eq!(store.withdraw(&k, 1).await.unwrap(), None);
        assert_eq!(store.withdraw(&key("ghost@example.com"), 1).await.unwrap(), None);

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, TransactionKind::Withdrawal);
    }

    #[tokio::test]
    async fn test_history_newest_first_and_scoped() {
        let store = InMemoryLedgerStore::new();
        let alice = key("alice@example.com");
        let bob = key("bob@example.com");
        store.deposit(&alice, 1).await.unwrap();
        store.deposit(&bob, 5).await.unwrap();
        store.deposit(&alice, 2).await.unwrap();
        store.deposit(&alice, 3).await.unwrap();

        let history = store.history(&alice, 2).await.unwrap();
        let amounts: Vec<i64> = history.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![3, 2]);
    }
}
