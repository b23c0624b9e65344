//! CreatePendingPaymentHandler - Command handler for registering a payment.
//!
//! Runs when a card intent is created or a crypto deposit address is handed
//! out, always before any callback for that reference can arrive.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::payment::{
    validate_crypto_amount, Payment, PaymentError, Plan, RailIdentifier, CRYPTO_ASSET,
};
use crate::ports::{LedgerError, PaymentLedger};

/// Command to create a PENDING payment.
#[derive(Debug, Clone)]
pub struct CreatePendingPaymentCommand {
    pub user_id: UserId,
    pub identifier: RailIdentifier,
    pub plan: Plan,
    /// Required for crypto, ignored for card (card prices come from the plan).
    pub crypto_amount: Option<Decimal>,
}

/// Result of payment creation.
#[derive(Debug, Clone)]
pub struct CreatePendingPaymentResult {
    pub payment: Payment,
    /// True when the reference was already registered for this user.
    pub already_existed: bool,
}

/// Handler for creating PENDING payments.
pub struct CreatePendingPaymentHandler {
    ledger: Arc<dyn PaymentLedger>,
    card_currency: String,
}

impl CreatePendingPaymentHandler {
    pub fn new(ledger: Arc<dyn PaymentLedger>, card_currency: impl Into<String>) -> Self {
        Self {
            ledger,
            card_currency: card_currency.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreatePendingPaymentCommand,
    ) -> Result<CreatePendingPaymentResult, PaymentError> {
        let rail = cmd.identifier.rail();
        let reference = cmd.identifier.to_reference()?;

        let (amount, currency) = match &cmd.identifier {
            RailIdentifier::Card { .. } => (cmd.plan.card_amount(), self.card_currency.as_str()),
            RailIdentifier::Crypto { .. } => {
                let amount = cmd
                    .crypto_amount
                    .ok_or_else(|| PaymentError::validation("amount", "required for crypto payments"))?;
                (validate_crypto_amount(amount)?, CRYPTO_ASSET)
            }
        };

        let payment = Payment::create_pending(
            PaymentId::new(),
            cmd.user_id.clone(),
            rail,
            reference.clone(),
            amount,
            currency,
            cmd.plan,
            Timestamp::now(),
        )?;

        match self.ledger.create_pending(&payment).await {
            Ok(()) => {
                tracing::info!(
                    payment_id = %payment.id(),
                    rail = %rail,
                    reference = %reference,
                    plan = %payment.plan(),
                    amount = %payment.amount(),
                    "Created pending payment"
                );
                Ok(CreatePendingPaymentResult {
                    payment,
                    already_existed: false,
                })
            }
            Err(LedgerError::DuplicateReference { .. }) => {
                let existing = self
                    .ledger
                    .find_by_reference(rail, &reference)
                    .await?
                    .ok_or_else(|| PaymentError::duplicate_reference(rail, reference.clone()))?;

                // Another user's reference is never handed back.
                if existing.user_id() != &cmd.user_id {
                    tracing::warn!(
                        rail = %rail,
                        reference = %reference,
                        "Reference already registered to a different user"
                    );
                    return Err(PaymentError::duplicate_reference(rail, reference));
                }

                tracing::debug!(
                    payment_id = %existing.id(),
                    reference = %reference,
                    "Reference already registered, returning existing payment"
                );
                Ok(CreatePendingPaymentResult {
                    payment: existing,
                    already_existed: true,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}
