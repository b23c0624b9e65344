//! GetPaymentStatusHandler - Query handler for a user's own payment.

use std::sync::Arc;

use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::payment::{PaymentError, PaymentRail, PaymentStatus, Plan};
use crate::ports::PaymentLedger;

/// Query for the status of one payment.
#[derive(Debug, Clone)]
pub struct GetPaymentStatusQuery {
    pub payment_id: PaymentId,
    pub user_id: UserId,
}

/// Status view of a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPaymentStatusResult {
    pub id: PaymentId,
    pub status: PaymentStatus,
    pub rail: PaymentRail,
    pub plan: Plan,
    pub created_at: Timestamp,
    pub confirmed_at: Option<Timestamp>,
}

/// Handler for payment status queries.
///
/// Payments of other users are reported as not found.
pub struct GetPaymentStatusHandler {
    ledger: Arc<dyn PaymentLedger>,
}

impl GetPaymentStatusHandler {
    pub fn new(ledger: Arc<dyn PaymentLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        query: GetPaymentStatusQuery,
    ) -> Result<GetPaymentStatusResult, PaymentError> {
        let payment = self
            .ledger
            .find_by_id_and_user(&query.payment_id, &query.user_id)
            .await?
            .ok_or_else(|| PaymentError::not_found(query.payment_id))?;

        Ok(GetPaymentStatusResult {
            id: *payment.id(),
            status: payment.status(),
            rail: payment.rail(),
            plan: payment.plan(),
            created_at: payment.created_at(),
            confirmed_at: payment.confirmed_at(),
        })
    }
}
