//! ConfirmationCoordinator - moves a payment to its final state exactly once.
//!
//! Each callback runs as: resolve reference, lock the row, apply the state
//! machine, persist, and on a fresh PENDING -> CONFIRMED edge only, activate
//! the entitlement after commit. Duplicate callbacks serialize on the row
//! lock and observe `AlreadyFinalized`.
//!
//! Confirmation and activation are separate failure domains. A failed
//! activation never rolls back CONFIRMED; it is reported as
//! `ActivationFailed` and finished by the activation sweep.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::foundation::{PaymentId, Timestamp};
use crate::domain::payment::{
    ActivationRecord, AmountPolicies, FailureReason, Payment, PaymentError, PaymentStatus,
    RailIdentifier, TransitionOutcome,
};
use crate::ports::PaymentLedger;

use super::{ActivationAttempt, EntitlementActivator, IntentReconciler};

/// Success callback from a rail.
#[derive(Debug, Clone)]
pub struct HandleConfirmationCommand {
    pub identifier: RailIdentifier,
    pub observed_amount: Decimal,
    /// Inbound request id, forwarded to the subscriptions service.
    /// A fresh id is generated when absent.
    pub correlation_id: Option<String>,
}

/// Failure or cancellation callback from a rail.
#[derive(Debug, Clone)]
pub struct HandleFailureCommand {
    pub identifier: RailIdentifier,
    pub reason: String,
}

/// Observable result of a confirmation or failure callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// Fresh confirmation; the entitlement was extended.
    Confirmed {
        payment_id: PaymentId,
        new_expiry: Timestamp,
    },

    /// Fresh failure, either rail-reported or an amount mismatch.
    Failed {
        payment_id: PaymentId,
        reason: FailureReason,
    },

    /// Idempotent replay against a terminal payment.
    AlreadyFinalized {
        payment_id: PaymentId,
        status: PaymentStatus,
    },

    /// No payment registered for the reference. Not retried.
    Unknown,

    /// Payment is durably CONFIRMED; activation will be retried out of band.
    ActivationFailed {
        payment_id: PaymentId,
        reason: String,
    },
}

impl ConfirmationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationOutcome::Confirmed { .. } => "confirmed",
            ConfirmationOutcome::Failed { .. } => "failed",
            ConfirmationOutcome::AlreadyFinalized { .. } => "already-finalized",
            ConfirmationOutcome::Unknown => "unknown",
            ConfirmationOutcome::ActivationFailed { .. } => "activation-failed",
        }
    }

    pub fn payment_id(&self) -> Option<PaymentId> {
        match self {
            ConfirmationOutcome::Confirmed { payment_id, .. }
            | ConfirmationOutcome::Failed { payment_id, .. }
            | ConfirmationOutcome::AlreadyFinalized { payment_id, .. }
            | ConfirmationOutcome::ActivationFailed { payment_id, .. } => Some(*payment_id),
            ConfirmationOutcome::Unknown => None,
        }
    }
}

/// Transition to apply under the row lock.
enum Callback {
    Settle {
        observed: Decimal,
        correlation_id: String,
    },
    Fail(FailureReason),
}

/// Coordinates confirmation and failure callbacks.
///
/// Store errors are returned as retryable `PaymentError`s and never turn
/// into a FAILED payment.
#[derive(Clone)]
pub struct ConfirmationCoordinator {
    ledger: Arc<dyn PaymentLedger>,
    reconciler: IntentReconciler,
    activator: EntitlementActivator,
    policies: AmountPolicies,
}

impl ConfirmationCoordinator {
    pub fn new(
        ledger: Arc<dyn PaymentLedger>,
        activator: EntitlementActivator,
        policies: AmountPolicies,
    ) -> Self {
        Self {
            reconciler: IntentReconciler::new(Arc::clone(&ledger)),
            ledger,
            activator,
            policies,
        }
    }

    /// Handles a success callback carrying the observed amount.
    pub async fn handle_confirmation(
        &self,
        cmd: HandleConfirmationCommand,
    ) -> Result<ConfirmationOutcome, PaymentError> {
        let correlation_id = cmd
            .correlation_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let callback = Callback::Settle {
            observed: cmd.observed_amount,
            correlation_id,
        };
        self.run_detached(cmd.identifier, callback).await
    }

    /// Handles a rail-reported failure or cancellation.
    pub async fn handle_failure(
        &self,
        cmd: HandleFailureCommand,
    ) -> Result<ConfirmationOutcome, PaymentError> {
        let reason = FailureReason::RailReported { reason: cmd.reason };
        self.run_detached(cmd.identifier, Callback::Fail(reason)).await
    }

    /// Runs the callback on its own task so that dropping the caller (for
    /// example a disconnected HTTP client) cannot cancel a unit of work
    /// that already holds the row lock.
    async fn run_detached(
        &self,
        identifier: RailIdentifier,
        callback: Callback,
    ) -> Result<ConfirmationOutcome, PaymentError> {
        let this = self.clone();
        tokio::spawn(async move { this.process(identifier, callback).await })
            .await
            .map_err(|e| PaymentError::store(format!("confirmation task aborted: {}", e)))?
    }

    async fn process(
        &self,
        identifier: RailIdentifier,
        callback: Callback,
    ) -> Result<ConfirmationOutcome, PaymentError> {
        let resolved = match self.reconciler.resolve(&identifier).await {
            Ok(payment) => payment,
            Err(PaymentError::UnknownPayment { .. }) => return Ok(ConfirmationOutcome::Unknown),
            Err(err) => return Err(err),
        };
        let payment_id = *resolved.id();

        let mut uow = self.ledger.begin().await?;
        let Some(mut payment) = uow.lock_for_update(&payment_id).await? else {
            uow.rollback().await?;
            return Ok(ConfirmationOutcome::Unknown);
        };

        let now = Timestamp::now();
        let (transition, correlation_id) = match callback {
            Callback::Settle {
                observed,
                correlation_id,
            } => {
                let policy = self.policies.for_rail(payment.rail());
                (payment.settle(observed, policy, now), correlation_id)
            }
            Callback::Fail(reason) => (payment.fail(reason, now), String::new()),
        };

        match transition {
            TransitionOutcome::AlreadyFinalized(status) => {
                uow.commit().await?;
                tracing::warn!(
                    payment_id = %payment_id,
                    reference = %payment.external_reference(),
                    status = %status,
                    "Duplicate callback for finalized payment"
                );
                Ok(ConfirmationOutcome::AlreadyFinalized { payment_id, status })
            }
            TransitionOutcome::Failed(reason) => {
                uow.save(&payment).await?;
                uow.commit().await?;
                tracing::info!(
                    payment_id = %payment_id,
                    reference = %payment.external_reference(),
                    reason = %reason,
                    "Payment failed"
                );
                Ok(ConfirmationOutcome::Failed { payment_id, reason })
            }
            TransitionOutcome::Confirmed => {
                uow.save(&payment).await?;
                uow.upsert_activation(&ActivationRecord::started(payment_id, now))
                    .await?;
                uow.commit().await?;
                tracing::info!(
                    payment_id = %payment_id,
                    reference = %payment.external_reference(),
                    user_id = %payment.user_id(),
                    plan = %payment.plan(),
                    correlation_id = %correlation_id,
                    "Payment confirmed"
                );
                Ok(self.activate(&payment, &correlation_id).await)
            }
        }
    }

    async fn activate(&self, payment: &Payment, correlation_id: &str) -> ConfirmationOutcome {
        let payment_id = *payment.id();
        match self.activator.activate(payment, correlation_id).await {
            ActivationAttempt::Activated { new_expiry } => ConfirmationOutcome::Confirmed {
                payment_id,
                new_expiry,
            },
            ActivationAttempt::Failed { reason } => {
                ConfirmationOutcome::ActivationFailed { payment_id, reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPaymentLedger;
    use crate::adapters::subscriptions::InMemorySubscriptionActivationClient;
    use crate::domain::foundation::UserId;
    use crate::domain::payment::{ActivationState, PaymentRail, Plan};
    use crate::ports::{ActivationError, SubscriptionActivationClient};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    /// Records calls and answers with a fixed result.
    struct MockActivationClient {
        calls: Mutex<Vec<(UserId, Plan, u32)>>,
        fail: bool,
    }

    impl MockActivationClient {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SubscriptionActivationClient for MockActivationClient {
        async fn activate(
            &self,
            user_id: &UserId,
            plan: Plan,
            duration_days: u32,
            _correlation_id: &str,
        ) -> Result<Timestamp, ActivationError> {
            self.calls
                .lock()
                .unwrap()
                .push((user_id.clone(), plan, duration_days));
            if self.fail {
                Err(ActivationError::Unavailable("subscriptions down".into()))
            } else {
                Ok(Timestamp::now().add_days(i64::from(duration_days)))
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn seed_card_payment(ledger: &InMemoryPaymentLedger, intent: &str, amount: &str) -> Payment {
        let payment = Payment::create_pending(
            PaymentId::new(),
            UserId::new("user-1").unwrap(),
            PaymentRail::Card,
            RailIdentifier::card(intent).to_reference().unwrap(),
            dec(amount),
            "SEK",
            Plan::Monthly,
            Timestamp::now(),
        )
        .unwrap();
        ledger.create_pending(&payment).await.unwrap();
        payment
    }

    fn coordinator(
        ledger: Arc<InMemoryPaymentLedger>,
        client: Arc<dyn SubscriptionActivationClient>,
    ) -> ConfirmationCoordinator {
        let activator = EntitlementActivator::new(ledger.clone(), client);
        ConfirmationCoordinator::new(ledger, activator, AmountPolicies::default())
    }

    fn confirm_cmd(intent: &str, amount: &str) -> HandleConfirmationCommand {
        HandleConfirmationCommand {
            identifier: RailIdentifier::card(intent),
            observed_amount: dec(amount),
            correlation_id: None,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn confirms_and_activates_once() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(MockActivationClient::new());
        let payment = seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), client.clone());

        let first = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "1000"))
            .await
            .unwrap();
        let second = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "1000"))
            .await
            .unwrap();

        assert_eq!(first.as_str(), "confirmed");
        assert_eq!(second.as_str(), "already-finalized");
        assert_eq!(client.call_count(), 1);

        let stored = ledger.find_by_id(payment.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Confirmed);
        let record = ledger.activation_record(payment.id()).unwrap();
        assert_eq!(record.state, ActivationState::Activated);
    }

    #[tokio::test]
    async fn short_amount_fails_without_activation() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(MockActivationClient::new());
        let payment = seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), client.clone());

        let outcome = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "400"))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ConfirmationOutcome::Failed {
                reason: FailureReason::AmountMismatch { .. },
                ..
            }
        ));
        assert_eq!(client.call_count(), 0);
        assert!(ledger.activation_record(payment.id()).is_none());
    }

    #[tokio::test]
    async fn failed_payment_is_not_resurrected() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(MockActivationClient::new());
        let payment = seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), client.clone());

        coordinator
            .handle_confirmation(confirm_cmd("pi_1", "400"))
            .await
            .unwrap();
        let replay = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "1000"))
            .await
            .unwrap();

        assert_eq!(
            replay,
            ConfirmationOutcome::AlreadyFinalized {
                payment_id: *payment.id(),
                status: PaymentStatus::Failed,
            }
        );
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_reference_creates_nothing() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(MockActivationClient::new());
        let coordinator = coordinator(ledger.clone(), client.clone());

        let outcome = coordinator
            .handle_confirmation(confirm_cmd("pi_never_created", "1000"))
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmationOutcome::Unknown);
        assert_eq!(ledger.payment_count(), 0);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn activation_failure_keeps_payment_confirmed() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(MockActivationClient::failing());
        let payment = seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), client.clone());

        let outcome = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "1000"))
            .await
            .unwrap();

        assert_eq!(outcome.as_str(), "activation-failed");
        let stored = ledger.find_by_id(payment.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Confirmed);

        let record = ledger.activation_record(payment.id()).unwrap();
        assert_eq!(record.state, ActivationState::Failed);
        assert_eq!(record.attempts, 1);

        // A replayed callback never re-triggers activation.
        let replay = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "1000"))
            .await
            .unwrap();
        assert_eq!(replay.as_str(), "already-finalized");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn rail_failure_then_success_stays_failed() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(MockActivationClient::new());
        seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), client.clone());

        let failed = coordinator
            .handle_failure(HandleFailureCommand {
                identifier: RailIdentifier::card("pi_1"),
                reason: "payment_intent.canceled".into(),
            })
            .await
            .unwrap();
        assert_eq!(failed.as_str(), "failed");

        let replay = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "1000"))
            .await
            .unwrap();
        assert_eq!(replay.as_str(), "already-finalized");
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn failure_callback_for_unknown_reference_is_unknown() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let coordinator = coordinator(ledger, Arc::new(MockActivationClient::new()));

        let outcome = coordinator
            .handle_failure(HandleFailureCommand {
                identifier: RailIdentifier::card("pi_x"),
                reason: "declined".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Unknown);
    }

    #[tokio::test]
    async fn store_fault_is_an_error_not_a_failed_outcome() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let payment = seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), Arc::new(MockActivationClient::new()));

        ledger.set_unavailable(true);
        let result = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "1000"))
            .await;
        assert!(matches!(result, Err(ref e) if e.is_retryable()));

        ledger.set_unavailable(false);
        let stored = ledger.find_by_id(payment.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn confirmed_activation_extends_entitlement() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(InMemorySubscriptionActivationClient::new());
        let payment = seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), client.clone());
        let before = Timestamp::now();

        let outcome = coordinator
            .handle_confirmation(confirm_cmd("pi_1", "1000"))
            .await
            .unwrap();

        let ConfirmationOutcome::Confirmed { new_expiry, .. } = outcome else {
            panic!("expected confirmed, got {:?}", outcome);
        };
        assert!(new_expiry.duration_since(&before) >= Duration::days(30));
        assert_eq!(client.expiry_for(payment.user_id()), Some(new_expiry));
    }

    #[tokio::test]
    async fn inbound_request_id_reaches_subscriptions_call() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(InMemorySubscriptionActivationClient::new());
        seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), client.clone());

        let mut cmd = confirm_cmd("pi_1", "1000");
        cmd.correlation_id = Some("req-7f3a".to_string());
        coordinator.handle_confirmation(cmd).await.unwrap();

        assert_eq!(client.calls()[0].correlation_id, "req-7f3a");
    }

    #[tokio::test]
    async fn missing_request_id_gets_a_generated_one() {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let client = Arc::new(InMemorySubscriptionActivationClient::new());
        seed_card_payment(&ledger, "pi_1", "1000").await;
        let coordinator = coordinator(ledger.clone(), client.clone());

        let mut cmd = confirm_cmd("pi_1", "1000");
        cmd.correlation_id = Some(String::new());
        coordinator.handle_confirmation(cmd).await.unwrap();

        let sent = &client.calls()[0].correlation_id;
        assert!(Uuid::parse_str(sent).is_ok(), "not a uuid: {}", sent);
    }
}
