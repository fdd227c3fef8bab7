//! Database models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::DbError;

// ============================================================================
// Credential Models
// ============================================================================

/// Refresh token joined with the email of the account that owns it
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbRefreshToken {
    pub user_id: Uuid,
    pub email: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Balance Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAccount {
    pub subject_key: String,
    /// Balance in minor units; never negative
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbTransaction {
    pub id: Uuid,
    pub subject_key: String,
    pub amount: i64,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// Kind of a ledger transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            other => Err(DbError::InvalidInput(format!(
                "transaction type must be 'deposit' or 'withdrawal', got '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_kind_parse() {
        assert_eq!("deposit".parse::<TransactionKind>().unwrap(), TransactionKind::Deposit);
        assert_eq!("withdrawal".parse::<TransactionKind>().unwrap(), TransactionKind::Withdrawal);
    }

    #[test]
    fn test_transaction_kind_rejects_unknown() {
        assert!("transfer".parse::<TransactionKind>().is_err());
        assert!("Deposit".parse::<TransactionKind>().is_err());
        assert!("".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_transaction_kind_display_matches_column_value() {
        for kind in [TransactionKind::Deposit, TransactionKind::Withdrawal] {
            assert_eq!(kind.to_string().parse::<TransactionKind>().unwrap(), kind);
        }
    }
}
