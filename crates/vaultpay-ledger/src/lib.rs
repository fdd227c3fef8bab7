//! VaultPay Balance Ledger
//!
//! Integer balances mutated only through the card settlement gateway:
//!
//! - **Replenish**: charge a card, then credit the caller's balance
//! - **Withdraw**: pre-check funds, pay out to a card, then debit the balance
//! - **Audit**: every applied change appends exactly one transaction record
//!
//! # Flow
//!
//! ```text
//! token ──► SubjectResolver ──► SubjectKey
//!                                   │
//!            (withdraw) balance ◄───┤
//!                                   ▼
//!                          SettlementGateway ──► GatewayOutcome
//!                                   │ Success
//!                                   ▼
//!                 LedgerStore: apply + record (one transaction)
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod store;
pub mod types;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use gateway::{
    classify, GatewayCall, GatewayError, GatewayOutcome, HttpSettlementGateway, InMemoryGateway,
    SettlementGateway,
};
pub use ledger::BalanceLedger;
pub use store::{InMemoryLedgerStore, LedgerStore, PgLedgerStore};
pub use types::{CardDetails, Receipt, SubjectKey, TransactionKind, TransactionRecord};
