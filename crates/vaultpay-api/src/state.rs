//! Application state shared across handlers

use std::sync::Arc;
use vaultpay_auth::AuthService;
use vaultpay_ledger::BalanceLedger;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Token issuance and refresh
    pub auth: Arc<AuthService>,
    /// Balance mutations
    pub ledger: Arc<BalanceLedger>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, ledger: Arc<BalanceLedger>) -> Self {
        Self { auth, ledger }
    }
}
