//! Balance and transaction repository

use sqlx::{PgPool, Postgres, Transaction};

use crate::{DbAccount, DbError, DbResult, DbTransaction, TransactionKind};

/// Balance repository. Every mutation writes the balance change and its
/// transaction record inside one database transaction.
#[derive(Clone)]
pub struct BalanceRepo {
    pool: PgPool,
}

impl BalanceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the account row for a subject key
    pub async fn find_account(&self, subject_key: &str) -> DbResult<Option<DbAccount>> {
        let account = sqlx::query_as::<_, DbAccount>(
            "SELECT subject_key, balance, updated_at FROM accounts WHERE subject_key = $1"
        )
        .bind(subject_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Current balance; a missing account reads as zero
    pub async fn get_balance(&self, subject_key: &str) -> DbResult<i64> {
        Ok(self
            .find_account(subject_key)
            .await?
            .map(|a| a.balance)
            .unwrap_or(0))
    }

    /// Credit the account, creating it on first deposit
    pub async fn deposit(&self, subject_key: &str, amount: i64) -> DbResult<DbAccount> {
        if amount <= 0 {
            return Err(DbError::InvalidInput("Deposit amount must be positive".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, DbAccount>(
            r#"
            INSERT INTO accounts (subject_key, balance)
            VALUES ($1, $2)
            ON CONFLICT (subject_key)
            DO UPDATE SET balance = accounts.balance + $2, updated_at = NOW()
            RETURNING subject_key, balance, updated_at
            "#
        )
        .bind(subject_key)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_record(&mut tx, subject_key, amount, TransactionKind::Deposit).await?;

        tx.commit().await?;

        Ok(account)
    }

    /// Debit the account if and only if the balance covers `amount`.
    ///
    /// Returns `None` when the conditional update matched no row, either
    /// because the account is missing or the balance is too low. Nothing is
    /// recorded in that case.
    pub async fn withdraw(&self, subject_key: &str, amount: i64) -> DbResult<Option<DbAccount>> {
        if amount <= 0 {
            return Err(DbError::InvalidInput("Withdrawal amount must be positive".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, DbAccount>(
            r#"
            UPDATE accounts
            SET balance = balance - $2, updated_at = NOW()
            WHERE subject_key = $1 AND balance >= $2
            RETURNING subject_key, balance, updated_at
            "#
        )
        .bind(subject_key)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(account) = account else {
            tx.rollback().await?;
            return Ok(None);
        };

        Self::insert_record(&mut tx, subject_key, amount, TransactionKind::Withdrawal).await?;

        tx.commit().await?;

        Ok(Some(account))
    }

    /// Most recent transactions for a subject, newest first
    pub async fn list_transactions(&self, subject_key: &str, limit: i64) -> DbResult<Vec<DbTransaction>> {
        let records = sqlx::query_as::<_, DbTransaction>(
            r#"
            SELECT id, subject_key, amount, type, created_at
            FROM transactions
            WHERE subject_key = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        )
        .bind(subject_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_record(
        tx: &mut Transaction<'_, Postgres>,
        subject_key: &str,
        amount: i64,
        kind: TransactionKind,
    ) -> DbResult<DbTransaction> {
        let record = sqlx::query_as::<_, DbTransaction>(
            r#"
            INSERT INTO transactions (subject_key, amount, type)
            VALUES ($1, $2, $3)
            RETURNING id, subject_key, amount, type, created_at
            "#
        )
        .bind(subject_key)
        .bind(amount)
        .bind(kind.as_str())
        .fetch_one(&mut **tx)
        .await?;

        Ok(record)
    }
}
