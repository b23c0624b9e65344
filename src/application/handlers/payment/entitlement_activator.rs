//! EntitlementActivator - invokes activation for a confirmed payment and
//! records the result.
//!
//! Shared by the confirmation coordinator (first attempt, right after the
//! CONFIRMED commit) and the activation sweep (later attempts). Callers must
//! have claimed the activation record as `in_progress` before calling.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::{ActivationState, Payment, PaymentError};
use crate::ports::{PaymentLedger, SubscriptionActivationClient};

/// Outcome of one activation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationAttempt {
    Activated { new_expiry: Timestamp },
    Failed { reason: String },
}

#[derive(Clone)]
pub struct EntitlementActivator {
    ledger: Arc<dyn PaymentLedger>,
    client: Arc<dyn SubscriptionActivationClient>,
}

impl EntitlementActivator {
    pub fn new(
        ledger: Arc<dyn PaymentLedger>,
        client: Arc<dyn SubscriptionActivationClient>,
    ) -> Self {
        Self { ledger, client }
    }

    /// Calls the activation client once, then persists the outcome.
    ///
    /// A failure to persist is logged and does not change the returned
    /// attempt: the record stays `in_progress` and the sweep picks it up
    /// once stale.
    pub async fn activate(&self, payment: &Payment, correlation_id: &str) -> ActivationAttempt {
        let attempt = match self
            .client
            .activate(
                payment.user_id(),
                payment.plan(),
                payment.duration_days(),
                correlation_id,
            )
            .await
        {
            Ok(new_expiry) => {
                tracing::info!(
                    payment_id = %payment.id(),
                    user_id = %payment.user_id(),
                    correlation_id,
                    new_expiry = %new_expiry.as_datetime(),
                    "Entitlement activated"
                );
                ActivationAttempt::Activated { new_expiry }
            }
            Err(err) => {
                tracing::error!(
                    payment_id = %payment.id(),
                    user_id = %payment.user_id(),
                    correlation_id,
                    error = %err,
                    "Entitlement activation failed; payment stays confirmed"
                );
                ActivationAttempt::Failed {
                    reason: err.to_string(),
                }
            }
        };

        if let Err(err) = self.record(payment, &attempt).await {
            tracing::error!(
                payment_id = %payment.id(),
                error = %err,
                "Could not record activation result"
            );
        }
        attempt
    }

    async fn record(&self, payment: &Payment, attempt: &ActivationAttempt) -> Result<(), PaymentError> {
        let mut uow = self.ledger.begin().await?;
        if uow.lock_for_update(payment.id()).await?.is_none() {
            uow.rollback().await?;
            return Err(PaymentError::not_found(*payment.id()));
        }

        let Some(mut record) = uow.activation(payment.id()).await? else {
            uow.rollback().await?;
            return Err(PaymentError::store(format!(
                "no activation record for payment {}",
                payment.id()
            )));
        };

        // Never downgrade an acknowledged activation.
        if record.state == ActivationState::Activated {
            uow.rollback().await?;
            return Ok(());
        }

        let now = Timestamp::now();
        match attempt {
            ActivationAttempt::Activated { new_expiry } => record.mark_activated(*new_expiry, now),
            ActivationAttempt::Failed { reason } => record.mark_failed(reason.clone(), now),
        }
        uow.upsert_activation(&record).await?;
        uow.commit().await?;
        Ok(())
    }
}
