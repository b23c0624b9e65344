//! IntentReconciler - maps a rail identifier to exactly one ledger row.
//!
//! Reconciliation never creates rows. A reference that was not registered
//! through payment creation is reported as `UnknownPayment`, which keeps
//! unsolicited callbacks from fabricating ledger entries.

use std::sync::Arc;

use crate::domain::payment::{ExternalReference, Payment, PaymentError, PaymentRail, RailIdentifier};
use crate::ports::PaymentLedger;

/// Resolves rail identifiers to ledger payments.
#[derive(Clone)]
pub struct IntentReconciler {
    ledger: Arc<dyn PaymentLedger>,
}

impl IntentReconciler {
    pub fn new(ledger: Arc<dyn PaymentLedger>) -> Self {
        Self { ledger }
    }

    /// Resolves a rail identifier, deriving the reference the same way
    /// payment creation does.
    pub async fn resolve(&self, identifier: &RailIdentifier) -> Result<Payment, PaymentError> {
        let reference = identifier.to_reference()?;
        self.resolve_reference(identifier.rail(), &reference).await
    }

    pub async fn resolve_reference(
        &self,
        rail: PaymentRail,
        reference: &ExternalReference,
    ) -> Result<Payment, PaymentError> {
        match self.ledger.find_by_reference(rail, reference).await? {
            Some(payment) => Ok(payment),
            None => {
                tracing::warn!(
                    rail = %rail,
                    reference = %reference,
                    "Callback for unknown payment reference, possible spoofing"
                );
                Err(PaymentError::unknown_payment(rail, reference.clone()))
            }
        }
    }
}
