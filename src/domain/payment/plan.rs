//! Subscription plans a payment can purchase.

use crate::domain::foundation::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Asset used for crypto rail payments.
pub const CRYPTO_ASSET: &str = "XMR";

/// Atomic unit precision of [`CRYPTO_ASSET`] amounts.
pub const CRYPTO_DECIMALS: u32 = 12;

/// Entitlement plan purchased by a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// 30-day access window.
    Monthly,

    /// 365-day access window.
    Yearly,
}

impl Plan {
    /// Number of entitlement days this plan grants.
    pub fn duration_days(&self) -> u32 {
        match self {
            Plan::Monthly => 30,
            Plan::Yearly => 365,
        }
    }

    /// Card price in minor currency units.
    pub fn card_price_minor(&self) -> i64 {
        match self {
            Plan::Monthly => 4_900,
            Plan::Yearly => 49_900,
        }
    }

    /// Card price as the ledger amount.
    pub fn card_amount(&self) -> Decimal {
        Decimal::from(self.card_price_minor())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Monthly => "monthly",
            Plan::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Plan::Monthly),
            "yearly" => Ok(Plan::Yearly),
            other => Err(ValidationError::invalid_format(
                "plan",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}

/// Validates a caller-supplied crypto amount.
pub fn validate_crypto_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::invalid_format(
            "amount",
            "must be greater than zero",
        ));
    }
    if amount.normalize().scale() > CRYPTO_DECIMALS {
        return Err(ValidationError::invalid_format(
            "amount",
            format!("more than {} decimal places", CRYPTO_DECIMALS),
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn durations_match_plans() {
        assert_eq!(Plan::Monthly.duration_days(), 30);
        assert_eq!(Plan::Yearly.duration_days(), 365);
    }

    #[test]
    fn card_prices_are_minor_units() {
        assert_eq!(Plan::Monthly.card_amount(), Decimal::from(4900));
        assert_eq!(Plan::Yearly.card_amount(), Decimal::from(49900));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Monthly".parse::<Plan>().unwrap(), Plan::Monthly);
        assert_eq!(" YEARLY ".parse::<Plan>().unwrap(), Plan::Yearly);
        assert!("weekly".parse::<Plan>().is_err());
    }

    #[test]
    fn crypto_amount_must_be_positive() {
        assert!(validate_crypto_amount(Decimal::ZERO).is_err());
        assert!(validate_crypto_amount(dec("-0.1")).is_err());
        assert!(validate_crypto_amount(dec("0.25")).is_ok());
    }

    #[test]
    fn crypto_amount_precision_is_bounded() {
        assert!(validate_crypto_amount(dec("0.000000000001")).is_ok());
        assert!(validate_crypto_amount(dec("0.0000000000001")).is_err());
        // Trailing zeros do not count against precision.
        assert!(validate_crypto_amount(dec("1.0000000000000")).is_ok());
    }
}
