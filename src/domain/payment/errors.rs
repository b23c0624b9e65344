//! Payment-specific error types.
//!
//! `AlreadyFinalized` and amount mismatches are outcomes, not errors, and
//! therefore do not appear here.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | UnknownPayment | 404 |
//! | DuplicateReference | 409 |
//! | NotConfirmed | 409 |
//! | InvalidPlan | 400 |
//! | ValidationFailed | 400 |
//! | ActivationFailed | 502 |
//! | Store | 503 |
//! | LockTimeout | 503 |

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, ValidationError};

use super::{ExternalReference, PaymentRail};

/// Payment-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// No payment with this id (or not owned by the caller).
    NotFound(PaymentId),

    /// Reconciliation found no ledger row for a rail reference.
    UnknownPayment {
        rail: PaymentRail,
        reference: ExternalReference,
    },

    /// A payment already exists for this rail reference.
    DuplicateReference {
        rail: PaymentRail,
        reference: ExternalReference,
    },

    /// Activation was requested for a payment that is not CONFIRMED.
    NotConfirmed(PaymentId),

    /// Unknown plan name.
    InvalidPlan(String),

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Payment is durably CONFIRMED but entitlement activation did not succeed.
    ActivationFailed { payment_id: PaymentId, reason: String },

    /// Ledger store fault. The caller should retry.
    Store(String),

    /// Timed out waiting for the row lock. The caller should retry.
    LockTimeout(String),
}

impl PaymentError {
    pub fn not_found(id: PaymentId) -> Self {
        PaymentError::NotFound(id)
    }

    pub fn unknown_payment(rail: PaymentRail, reference: ExternalReference) -> Self {
        PaymentError::UnknownPayment { rail, reference }
    }

    pub fn duplicate_reference(rail: PaymentRail, reference: ExternalReference) -> Self {
        PaymentError::DuplicateReference { rail, reference }
    }

    pub fn not_confirmed(id: PaymentId) -> Self {
        PaymentError::NotConfirmed(id)
    }

    pub fn invalid_plan(plan: impl Into<String>) -> Self {
        PaymentError::InvalidPlan(plan.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn activation_failed(payment_id: PaymentId, reason: impl Into<String>) -> Self {
        PaymentError::ActivationFailed {
            payment_id,
            reason: reason.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        PaymentError::Store(message.into())
    }

    pub fn lock_timeout(message: impl Into<String>) -> Self {
        PaymentError::LockTimeout(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            PaymentError::NotFound(_) => ErrorCode::PaymentNotFound,
            PaymentError::UnknownPayment { .. } => ErrorCode::UnknownPayment,
            PaymentError::DuplicateReference { .. } => ErrorCode::DuplicateReference,
            PaymentError::NotConfirmed(_) => ErrorCode::InvalidStateTransition,
            PaymentError::InvalidPlan(_) => ErrorCode::InvalidPlan,
            PaymentError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            PaymentError::ActivationFailed { .. } => ErrorCode::ActivationFailed,
            PaymentError::Store(_) => ErrorCode::DatabaseError,
            PaymentError::LockTimeout(_) => ErrorCode::LockTimeout,
        }
    }

    /// Returns a caller-facing error message.
    pub fn message(&self) -> String {
        match self {
            PaymentError::NotFound(id) => format!("Payment not found: {}", id),
            PaymentError::UnknownPayment { rail, reference } => {
                format!("No {} payment for reference {}", rail, reference)
            }
            PaymentError::DuplicateReference { rail, reference } => {
                format!("A {} payment already exists for reference {}", rail, reference)
            }
            PaymentError::NotConfirmed(id) => format!("Payment {} is not confirmed", id),
            PaymentError::InvalidPlan(plan) => format!("Invalid plan: {}", plan),
            PaymentError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            PaymentError::ActivationFailed { payment_id, reason } => {
                format!("Activation failed for payment {}: {}", payment_id, reason)
            }
            PaymentError::Store(msg) => format!("Ledger unavailable: {}", msg),
            PaymentError::LockTimeout(msg) => format!("Lock timeout: {}", msg),
        }
    }

    /// Store faults are transient. Everything else is final for this request.
    pub fn is_retryable(&self) -> bool {
        self.code().is_transient()
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for PaymentError {}

impl From<ValidationError> for PaymentError {
    fn from(err: ValidationError) -> Self {
        if err.field() == "plan" {
            return PaymentError::InvalidPlan(err.to_string());
        }
        PaymentError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

/// Keeps the identifiers a caller needs to correlate the failure as details.
impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let base = DomainError::new(err.code(), err.message());
        match err {
            PaymentError::ValidationFailed { field, .. } => base.with_detail("field", field),
            PaymentError::NotFound(id) | PaymentError::NotConfirmed(id) => {
                base.with_detail("payment_id", id.to_string())
            }
            PaymentError::ActivationFailed { payment_id, .. } => {
                base.with_detail("payment_id", payment_id.to_string())
            }
            PaymentError::UnknownPayment { rail, reference }
            | PaymentError::DuplicateReference { rail, reference } => base
                .with_detail("rail", rail.to_string())
                .with_detail("reference", reference.to_string()),
            PaymentError::InvalidPlan(_) | PaymentError::Store(_) | PaymentError::LockTimeout(_) => {
                base
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ExternalReference {
        ExternalReference::new("pi_123").unwrap()
    }

    #[test]
    fn unknown_payment_maps_to_code() {
        let err = PaymentError::unknown_payment(PaymentRail::Card, reference());
        assert_eq!(err.code(), ErrorCode::UnknownPayment);
        assert_eq!(err.message(), "No card payment for reference pi_123");
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_faults_are_retryable() {
        assert!(PaymentError::store("connection reset").is_retryable());
        assert!(PaymentError::lock_timeout("55P03").is_retryable());
    }

    #[test]
    fn activation_failed_is_not_retryable_by_caller() {
        let err = PaymentError::activation_failed(PaymentId::new(), "503");
        assert_eq!(err.code(), ErrorCode::ActivationFailed);
        assert!(!err.is_retryable());
    }

    #[test]
    fn plan_validation_becomes_invalid_plan() {
        let err: PaymentError = ValidationError::invalid_format("plan", "unknown plan").into();
        assert!(matches!(err, PaymentError::InvalidPlan(_)));
        assert_eq!(err.code(), ErrorCode::InvalidPlan);
    }

    #[test]
    fn domain_error_carries_payment_id() {
        let id = PaymentId::new();
        let err: DomainError = PaymentError::not_found(id).into();
        assert_eq!(err.code, ErrorCode::PaymentNotFound);
        assert_eq!(err.details.get("payment_id"), Some(&id.to_string()));
    }

    #[test]
    fn domain_error_carries_rail_reference() {
        let err: DomainError = PaymentError::unknown_payment(PaymentRail::Card, reference()).into();
        assert_eq!(err.code, ErrorCode::UnknownPayment);
        assert_eq!(err.details.get("rail"), Some(&"card".to_string()));
        assert_eq!(err.details.get("reference"), Some(&"pi_123".to_string()));
    }

    #[test]
    fn store_fault_has_no_details() {
        let err: DomainError = PaymentError::store("pool timed out").into();
        assert!(err.details.is_empty());
    }
}
