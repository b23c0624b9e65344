//! HTTP DTOs (Data Transfer Objects) for payment endpoints.
//!
//! These types define the JSON request/response structure for the payment API.
//! Monetary amounts travel as decimal strings so no precision is lost.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::handlers::payment::{
    ConfirmationOutcome, CreatePendingPaymentResult, GetPaymentStatusResult, RetryOutcome,
};
use crate::domain::foundation::Timestamp;
use crate::domain::payment::{PaymentError, PaymentRail, RailIdentifier};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Rail reference fields as sent by the rail callback relays.
///
/// Card callbacks carry `intent_id`; crypto callbacks carry `address` and
/// optionally `subaddress_index`.
#[derive(Debug, Clone, Deserialize)]
pub struct RailReferenceDto {
    pub rail: String,
    #[serde(default)]
    pub intent_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub subaddress_index: Option<u32>,
}

impl RailReferenceDto {
    pub fn into_identifier(self) -> Result<RailIdentifier, PaymentError> {
        let rail: PaymentRail = self.rail.parse()?;
        match rail {
            PaymentRail::Card => {
                let intent_id = self
                    .intent_id
                    .ok_or_else(|| PaymentError::validation("intent_id", "required for card"))?;
                Ok(RailIdentifier::card(intent_id))
            }
            PaymentRail::Crypto => {
                let address = self
                    .address
                    .ok_or_else(|| PaymentError::validation("address", "required for crypto"))?;
                Ok(RailIdentifier::crypto(address, self.subaddress_index))
            }
        }
    }
}

/// Request to register a PENDING payment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub reference: RailReferenceDto,
    pub plan: String,
    /// Asset amount for crypto payments. Card amounts come from the plan.
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// Success callback from a rail.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationRequest {
    #[serde(flatten)]
    pub reference: RailReferenceDto,
    pub observed_amount: Decimal,
}

/// Failure or cancellation callback from a rail.
#[derive(Debug, Clone, Deserialize)]
pub struct FailureRequest {
    #[serde(flatten)]
    pub reference: RailReferenceDto,
    pub reason: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Ledger row as returned to the internal caller.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub user_id: String,
    pub rail: String,
    pub external_reference: String,
    pub amount: String,
    pub currency: String,
    pub plan: String,
    pub duration_days: u32,
    pub status: String,
    pub created_at: Timestamp,
    pub confirmed_at: Option<Timestamp>,
    pub already_existed: bool,
}

impl From<CreatePendingPaymentResult> for PaymentResponse {
    fn from(result: CreatePendingPaymentResult) -> Self {
        let p = result.payment;
        Self {
            id: p.id().to_string(),
            user_id: p.user_id().to_string(),
            rail: p.rail().as_str().to_string(),
            external_reference: p.external_reference().to_string(),
            amount: p.amount().to_string(),
            currency: p.currency().to_string(),
            plan: p.plan().as_str().to_string(),
            duration_days: p.duration_days(),
            status: p.status().as_str().to_string(),
            created_at: p.created_at(),
            confirmed_at: p.confirmed_at(),
            already_existed: result.already_existed,
        }
    }
}

/// Outcome of a confirmation or failure callback.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_expiry: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<ConfirmationOutcome> for CallbackResponse {
    fn from(outcome: ConfirmationOutcome) -> Self {
        let status = outcome.as_str().to_string();
        let payment_id = outcome.payment_id().map(|id| id.to_string());
        let (new_expiry, reason) = match outcome {
            ConfirmationOutcome::Confirmed { new_expiry, .. } => (Some(new_expiry), None),
            ConfirmationOutcome::Failed { reason, .. } => (None, Some(reason.to_string())),
            ConfirmationOutcome::ActivationFailed { reason, .. } => (None, Some(reason)),
            ConfirmationOutcome::AlreadyFinalized { .. } | ConfirmationOutcome::Unknown => {
                (None, None)
            }
        };
        Self {
            status,
            payment_id,
            new_expiry,
            reason,
        }
    }
}

/// Outcome of an operator activation retry.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationRetryResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_expiry: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<RetryOutcome> for ActivationRetryResponse {
    fn from(outcome: RetryOutcome) -> Self {
        let status = outcome.as_str().to_string();
        let (new_expiry, reason) = match outcome {
            RetryOutcome::Activated { new_expiry } => (Some(new_expiry), None),
            RetryOutcome::Failed { reason } => (None, Some(reason)),
            RetryOutcome::AlreadyActivated { new_expiry } => (new_expiry, None),
            RetryOutcome::InProgress => (None, None),
        };
        Self {
            status,
            new_expiry,
            reason,
        }
    }
}

/// Payment status for the owning user.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusResponse {
    pub id: String,
    pub status: String,
    pub rail: String,
    pub plan: String,
    pub created_at: Timestamp,
    pub confirmed_at: Option<Timestamp>,
}

impl From<GetPaymentStatusResult> for PaymentStatusResponse {
    fn from(result: GetPaymentStatusResult) -> Self {
        Self {
            id: result.id.to_string(),
            status: result.status.as_str().to_string(),
            rail: result.rail.as_str().to_string(),
            plan: result.plan.as_str().to_string(),
            created_at: result.created_at,
            confirmed_at: result.confirmed_at,
        }
    }
}
