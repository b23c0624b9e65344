//! Amount-mismatch policy applied before a success callback may confirm a payment.

use crate::domain::foundation::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PaymentRail;

/// Result of comparing an observed amount with the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountCheck {
    /// Observed amount is acceptable for confirmation.
    Acceptable,

    /// Observed amount is short of the expected amount beyond tolerance.
    Short { shortfall: Decimal },

    /// Observed amount exceeds the expected amount and overpayment is refused.
    Excess { excess: Decimal },
}

impl AmountCheck {
    pub fn is_acceptable(&self) -> bool {
        matches!(self, AmountCheck::Acceptable)
    }
}

/// Tolerance rules for a single rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountPolicy {
    tolerance: Decimal,
    accept_overpayment: bool,
}

impl AmountPolicy {
    pub fn new(tolerance: Decimal, accept_overpayment: bool) -> Result<Self, ValidationError> {
        if tolerance.is_sign_negative() {
            return Err(ValidationError::invalid_format(
                "tolerance",
                "must not be negative",
            ));
        }
        Ok(Self {
            tolerance,
            accept_overpayment,
        })
    }

    /// Exact match required in both directions.
    pub fn exact() -> Self {
        Self {
            tolerance: Decimal::ZERO,
            accept_overpayment: false,
        }
    }

    /// Underpayment fails, any overpayment confirms.
    pub fn at_least() -> Self {
        Self {
            tolerance: Decimal::ZERO,
            accept_overpayment: true,
        }
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    pub fn accepts_overpayment(&self) -> bool {
        self.accept_overpayment
    }

    pub fn evaluate(&self, expected: Decimal, observed: Decimal) -> AmountCheck {
        if observed < expected {
            let shortfall = expected - observed;
            if shortfall > self.tolerance {
                return AmountCheck::Short { shortfall };
            }
        } else if observed > expected && !self.accept_overpayment {
            let excess = observed - expected;
            if excess > self.tolerance {
                return AmountCheck::Excess { excess };
            }
        }
        AmountCheck::Acceptable
    }
}

/// Per-rail amount policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountPolicies {
    pub card: AmountPolicy,
    pub crypto: AmountPolicy,
}

impl AmountPolicies {
    pub fn for_rail(&self, rail: PaymentRail) -> &AmountPolicy {
        match rail {
            PaymentRail::Card => &self.card,
            PaymentRail::Crypto => &self.crypto,
        }
    }
}

impl Default for AmountPolicies {
    /// Card intents settle the exact amount. Crypto deposits confirm once the
    /// received balance reaches the expected amount.
    fn default() -> Self {
        Self {
            card: AmountPolicy::exact(),
            crypto: AmountPolicy::at_least(),
        }
    }
}
