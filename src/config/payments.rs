//! Payment rules and activation sweep configuration

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::application::handlers::payment::ActivationSweepConfig;
use crate::domain::payment::{AmountPolicies, AmountPolicy};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    /// Accepted shortfall for card payments, in minor units
    #[serde(default)]
    pub card_amount_tolerance: Decimal,

    /// Accepted shortfall for crypto payments, in asset units
    #[serde(default)]
    pub crypto_amount_tolerance: Decimal,

    /// Whether crypto overpayments confirm
    #[serde(default = "default_true")]
    pub crypto_accept_overpayment: bool,

    /// ISO currency for card prices
    #[serde(default = "default_card_currency")]
    pub card_currency: String,

    #[serde(default = "default_true")]
    pub sweep_enabled: bool,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u32,

    /// Age after which an in-progress activation is presumed abandoned
    #[serde(default = "default_stale_after")]
    pub activation_stale_after_secs: u64,
}

impl PaymentsConfig {
    /// Card overpayment is only accepted within the card tolerance.
    pub fn amount_policies(&self) -> Result<AmountPolicies, ValidationError> {
        let card = AmountPolicy::new(self.card_amount_tolerance, false)
            .map_err(|_| ValidationError::NegativeTolerance)?;
        let crypto = AmountPolicy::new(self.crypto_amount_tolerance, self.crypto_accept_overpayment)
            .map_err(|_| ValidationError::NegativeTolerance)?;
        Ok(AmountPolicies { card, crypto })
    }

    pub fn sweep_config(&self) -> ActivationSweepConfig {
        ActivationSweepConfig::default()
            .with_interval(Duration::from_secs(self.sweep_interval_secs))
            .with_batch_size(self.sweep_batch_size)
            .with_stale_after(Duration::from_secs(self.activation_stale_after_secs))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.amount_policies()?;
        let currency = self.card_currency.as_str();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency);
        }
        if self.sweep_interval_secs == 0 || self.sweep_batch_size == 0 {
            return Err(ValidationError::InvalidSweepConfig);
        }
        Ok(())
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            card_amount_tolerance: Decimal::ZERO,
            crypto_amount_tolerance: Decimal::ZERO,
            crypto_accept_overpayment: true,
            card_currency: default_card_currency(),
            sweep_enabled: true,
            sweep_interval_secs: default_sweep_interval(),
            sweep_batch_size: default_sweep_batch_size(),
            activation_stale_after_secs: default_stale_after(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_card_currency() -> String {
    "SEK".to_string()
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_sweep_batch_size() -> u32 {
    50
}

fn default_stale_after() -> u64 {
    300
}
