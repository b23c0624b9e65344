//! Payment status state machine.
//!
//! A payment starts PENDING and moves exactly once to CONFIRMED or FAILED.
//! Both outcomes are terminal.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a payment ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Created by the initiation flow, awaiting a rail callback.
    Pending,

    /// Funds received; entitlement activation is owed exactly once.
    Confirmed,

    /// Rail reported failure, or the observed amount did not match.
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn is_pending(&self) -> bool {
        *self == PaymentStatus::Pending
    }
}

impl StateMachine for PaymentStatus {
    fn successors(&self) -> &'static [Self] {
        match self {
            PaymentStatus::Pending => &[PaymentStatus::Confirmed, PaymentStatus::Failed],
            PaymentStatus::Confirmed | PaymentStatus::Failed => &[],
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "CONFIRMED" => Ok(PaymentStatus::Confirmed),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown payment status '{}'", other),
            )),
        }
    }
}
