//! Ledger configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settlement endpoints and deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Gateway endpoint that charges a card (used by replenish)
    pub charge_url: String,
    /// Gateway endpoint that credits a card (used by withdraw)
    pub credit_url: String,
    /// Deadline for each store call and subject resolution
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    /// Deadline for a gateway call
    #[serde(with = "humantime_serde")]
    pub settlement_timeout: Duration,
    /// Default page size for transaction history
    pub history_limit: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            charge_url: "https://arlan-api.azurewebsites.net/api/payment/pay".to_string(),
            credit_url: "https://arlan-api.azurewebsites.net/api/payment/addMoney".to_string(),
            store_timeout: Duration::from_secs(3),
            settlement_timeout: Duration::from_secs(16),
            history_limit: 50,
        }
    }
}

impl LedgerConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("PAYMENT_CHARGE_URL") {
            config.charge_url = url;
        }
        if let Ok(url) = std::env::var("PAYMENT_CREDIT_URL") {
            config.credit_url = url;
        }
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (name, url) in [("charge_url", &self.charge_url), ("credit_url", &self.credit_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("{} must be an http(s) URL", name));
            }
        }
        if self.store_timeout.is_zero() {
            errors.push("store_timeout must be positive".to_string());
        }
        if self.settlement_timeout.is_zero() {
            errors.push("settlement_timeout must be positive".to_string());
        }
        if self.history_limit <= 0 {
            errors.push("history_limit must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store_timeout, Duration::from_secs(3));
        assert_eq!(config.settlement_timeout, Duration::from_secs(16));
    }

    #[test]
    fn test_invalid_config() {
        let config = LedgerConfig {
            charge_url: "ftp://nope".to_string(),
            store_timeout: Duration::ZERO,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
