//! Payment aggregate and its transitions.
//!
//! A `Payment` is one row of the append-only payment ledger. Everything but
//! `status` and `confirmed_at` is fixed at creation.
//!
//! # Invariants
//!
//! - `status` only moves PENDING -> CONFIRMED or PENDING -> FAILED
//! - `confirmed_at` is set iff `status != PENDING`, and never overwritten
//! - `duration_days` is derived from `plan` at creation

use crate::domain::foundation::{PaymentId, StateMachine, Timestamp, UserId, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AmountCheck, AmountPolicy, ExternalReference, PaymentRail, PaymentStatus, Plan};

/// Why a payment moved to FAILED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// A success callback reported an amount outside the rail's tolerance.
    AmountMismatch { expected: Decimal, observed: Decimal },

    /// The rail itself reported failure or cancellation.
    RailReported { reason: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::AmountMismatch { expected, observed } => {
                write!(f, "amount mismatch: expected {}, observed {}", expected, observed)
            }
            FailureReason::RailReported { reason } => write!(f, "rail reported: {}", reason),
        }
    }
}

/// Result of applying a transition to a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Fresh PENDING -> CONFIRMED transition.
    Confirmed,

    /// Fresh PENDING -> FAILED transition.
    Failed(FailureReason),

    /// Payment was already terminal; nothing changed.
    AlreadyFinalized(PaymentStatus),
}

impl TransitionOutcome {
    /// True only for the PENDING -> CONFIRMED edge, which owes an activation.
    pub fn was_newly_confirmed(&self) -> bool {
        matches!(self, TransitionOutcome::Confirmed)
    }

    /// True when the row changed and must be saved.
    pub fn is_fresh(&self) -> bool {
        !matches!(self, TransitionOutcome::AlreadyFinalized(_))
    }
}

/// Ledger row for a single payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    user_id: UserId,
    rail: PaymentRail,
    external_reference: ExternalReference,
    amount: Decimal,
    currency: String,
    plan: Plan,
    duration_days: u32,
    status: PaymentStatus,
    created_at: Timestamp,
    confirmed_at: Option<Timestamp>,
}

impl Payment {
    /// Creates a new PENDING payment.
    #[allow(clippy::too_many_arguments)]
    pub fn create_pending(
        id: PaymentId,
        user_id: UserId,
        rail: PaymentRail,
        external_reference: ExternalReference,
        amount: Decimal,
        currency: impl Into<String>,
        plan: Plan,
        created_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::invalid_format(
                "amount",
                "must be greater than zero",
            ));
        }
        let currency = currency.into().trim().to_ascii_uppercase();
        if currency.is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }

        Ok(Self {
            id,
            user_id,
            rail,
            external_reference,
            amount,
            currency,
            plan,
            duration_days: plan.duration_days(),
            status: PaymentStatus::Pending,
            created_at,
            confirmed_at: None,
        })
    }

    /// Rebuilds a payment from persisted fields, rejecting rows that break
    /// the status/confirmed_at invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: PaymentId,
        user_id: UserId,
        rail: PaymentRail,
        external_reference: ExternalReference,
        amount: Decimal,
        currency: String,
        plan: Plan,
        duration_days: u32,
        status: PaymentStatus,
        created_at: Timestamp,
        confirmed_at: Option<Timestamp>,
    ) -> Result<Self, ValidationError> {
        if status.is_pending() != confirmed_at.is_none() {
            return Err(ValidationError::invalid_format(
                "confirmed_at",
                format!(
                    "must be set iff status is terminal (status {}, confirmed_at {})",
                    status,
                    if confirmed_at.is_some() { "set" } else { "null" }
                ),
            ));
        }
        if duration_days == 0 {
            return Err(ValidationError::out_of_range(
                "duration_days",
                1,
                i64::from(u32::MAX),
                0,
            ));
        }

        Ok(Self {
            id,
            user_id,
            rail,
            external_reference,
            amount,
            currency,
            plan,
            duration_days,
            status,
            created_at,
            confirmed_at,
        })
    }

    pub fn id(&self) -> &PaymentId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn rail(&self) -> PaymentRail {
        self.rail
    }

    pub fn external_reference(&self) -> &ExternalReference {
        &self.external_reference
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn plan(&self) -> Plan {
        self.plan
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn confirmed_at(&self) -> Option<Timestamp> {
        self.confirmed_at
    }

    /// Moves PENDING -> CONFIRMED. A terminal payment is left untouched.
    pub fn confirm(&mut self, now: Timestamp) -> TransitionOutcome {
        match self.finalize(PaymentStatus::Confirmed, now) {
            Some(previous) => TransitionOutcome::AlreadyFinalized(previous),
            None => TransitionOutcome::Confirmed,
        }
    }

    /// Moves PENDING -> FAILED. A terminal payment is left untouched.
    pub fn fail(&mut self, reason: FailureReason, now: Timestamp) -> TransitionOutcome {
        match self.finalize(PaymentStatus::Failed, now) {
            Some(previous) => TransitionOutcome::AlreadyFinalized(previous),
            None => TransitionOutcome::Failed(reason),
        }
    }

    /// Applies a success callback: confirms when the observed amount passes
    /// `policy`, otherwise fails with [`FailureReason::AmountMismatch`].
    ///
    /// Terminal payments report `AlreadyFinalized` whatever the amount.
    pub fn settle(
        &mut self,
        observed: Decimal,
        policy: &AmountPolicy,
        now: Timestamp,
    ) -> TransitionOutcome {
        if !self.status.is_pending() {
            return TransitionOutcome::AlreadyFinalized(self.status);
        }
        match policy.evaluate(self.amount, observed) {
            AmountCheck::Acceptable => self.confirm(now),
            AmountCheck::Short { .. } | AmountCheck::Excess { .. } => self.fail(
                FailureReason::AmountMismatch {
                    expected: self.amount,
                    observed,
                },
                now,
            ),
        }
    }

    /// Returns the already-terminal status, or applies `target` and returns None.
    fn finalize(&mut self, target: PaymentStatus, now: Timestamp) -> Option<PaymentStatus> {
        match self.status.transition_to(target) {
            Ok(next) => {
                self.status = next;
                self.confirmed_at = Some(now);
                None
            }
            Err(_) => Some(self.status),
        }
    }
}
