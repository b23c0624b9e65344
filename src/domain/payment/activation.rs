//! Activation bookkeeping for confirmed payments.
//!
//! Confirmation and entitlement activation fail independently. The record
//! tracks whether the activation owed by a CONFIRMED payment has been
//! acknowledged, so a sweep can finish it without re-confirming.

use crate::domain::foundation::{PaymentId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Progress of the activation owed by a confirmed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    InProgress,
    Activated,
    Failed,
}

impl ActivationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationState::InProgress => "in_progress",
            ActivationState::Activated => "activated",
            ActivationState::Failed => "failed",
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ActivationState::InProgress),
            "activated" => Ok(ActivationState::Activated),
            "failed" => Ok(ActivationState::Failed),
            other => Err(ValidationError::invalid_format(
                "activation_state",
                format!("unknown activation state '{}'", other),
            )),
        }
    }
}

/// One row of activation bookkeeping, keyed by payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub payment_id: PaymentId,
    pub state: ActivationState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub new_expiry: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl ActivationRecord {
    /// Record written alongside the PENDING -> CONFIRMED save.
    pub fn started(payment_id: PaymentId, now: Timestamp) -> Self {
        Self {
            payment_id,
            state: ActivationState::InProgress,
            attempts: 1,
            last_error: None,
            new_expiry: None,
            updated_at: now,
        }
    }

    /// Claims the record for another attempt.
    pub fn begin_retry(&mut self, now: Timestamp) {
        self.state = ActivationState::InProgress;
        self.attempts = self.attempts.saturating_add(1);
        self.updated_at = now;
    }

    pub fn mark_activated(&mut self, new_expiry: Timestamp, now: Timestamp) {
        self.state = ActivationState::Activated;
        self.new_expiry = Some(new_expiry);
        self.last_error = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, now: Timestamp) {
        self.state = ActivationState::Failed;
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    pub fn is_activated(&self) -> bool {
        self.state == ActivationState::Activated
    }

    /// Failed records are always due. In-progress records are due once they
    /// have not been touched since `stale_before`, which covers a crash
    /// between commit and the activation call.
    pub fn is_due(&self, stale_before: Timestamp) -> bool {
        match self.state {
            ActivationState::Failed => true,
            ActivationState::InProgress => self.updated_at.is_before(&stale_before),
            ActivationState::Activated => false,
        }
    }
}
