//! Ledger types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use vaultpay_db::TransactionKind;

/// Canonical storage key for a subject.
///
/// Subjects that parse as a UUID (hyphenated, simple, braced, URN, or simple
/// hex with a `0x` prefix) are stored as the lowercase hyphenated form.
/// Anything else, such as an email, is stored as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn from_subject(subject: &str) -> Self {
        let candidate = subject
            .strip_prefix("0x")
            .or_else(|| subject.strip_prefix("0X"))
            .unwrap_or(subject);

        match Uuid::parse_str(candidate) {
            Ok(uuid) => Self(uuid.hyphenated().to_string()),
            Err(_) => Self(subject.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Card presented for settlement
#[derive(Clone)]
pub struct CardDetails {
    pub number: String,
    pub owner: String,
    pub cvv: String,
}

impl CardDetails {
    pub fn new(number: impl Into<String>, owner: impl Into<String>, cvv: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            owner: owner.into(),
            cvv: cvv.into(),
        }
    }

    /// Card identified by number only, as used for payouts
    pub fn number_only(number: impl Into<String>) -> Self {
        Self::new(number, String::new(), String::new())
    }

    /// First four and last four digits, safe for logs
    pub fn masked_number(&self) -> String {
        let n = &self.number;
        if n.len() <= 8 || !n.is_ascii() {
            return "****".to_string();
        }
        format!("{}...{}", &n[..4], &n[n.len() - 4..])
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &self.masked_number())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Append-only record of a settled balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub subject_key: String,
    pub amount: i64,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<vaultpay_db::DbTransaction> for TransactionRecord {
    type Error = vaultpay_db::DbError;

    fn try_from(row: vaultpay_db::DbTransaction) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: row.kind.parse()?,
            subject_key: row.subject_key,
            amount: row.amount,
            created_at: row.created_at,
        })
    }
}

/// Result of a successful replenish or withdraw
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub subject: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_subject_kept_verbatim() {
        assert_eq!(SubjectKey::from_subject("Alice@Example.com").as_str(), "Alice@Example.com");
        assert_eq!(SubjectKey::from_subject(" alice@example.com ").as_str(), " alice@example.com ");
        assert_ne!(
            SubjectKey::from_subject(" alice@example.com"),
            SubjectKey::from_subject("alice@example.com")
        );
    }

    #[test]
    fn test_uuid_encodings_share_one_key() {
        let expected = "8f14e45f-ceea-467f-a0e6-1a2b3c4d5e6f";
        for encoded in [
            "8f14e45f-ceea-467f-a0e6-1a2b3c4d5e6f",
            "8F14E45F-CEEA-467F-A0E6-1A2B3C4D5E6F",
            "8f14e45fceea467fa0e61a2b3c4d5e6f",
            "0x8F14E45FCEEA467FA0E61A2B3C4D5E6F",
            "{8f14e45f-ceea-467f-a0e6-1a2b3c4d5e6f}",
        ] {
            assert_eq!(SubjectKey::from_subject(encoded).as_str(), expected, "{}", encoded);
        }
    }

    #[test]
    fn test_masked_card_number() {
        let card = CardDetails::new("4111111111111111", "Alice", "123");
        assert_eq!(card.masked_number(), "4111...1111");
        let debug = format!("{:?}", card);
        assert!(!debug.contains("123\""));
        assert!(!debug.contains("4111111111111111"));
        assert_eq!(CardDetails::number_only("1234").masked_number(), "****");
    }

    #[test]
    fn test_record_rejects_unknown_kind() {
        let row = vaultpay_db::DbTransaction {
            id: Uuid::new_v4(),
            subject_key: "s".to_string(),
            amount: 5,
            kind: "refund".to_string(),
            created_at: Utc::now(),
        };
        assert!(TransactionRecord::try_from(row).is_err());
    }
}
