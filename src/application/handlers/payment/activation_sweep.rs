//! ActivationSweep - background job that finishes owed activations.
//!
//! Confirmed payments whose activation failed, or whose `in_progress` record
//! went stale (crash between commit and the activation call), are retried
//! here. Confirmation is never re-run.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 60s | How often to look for due activations |
//! | `batch_size` | 50 | Max records per cycle |
//! | `stale_after` | 300s | Age at which an `in_progress` record is retried |
//!
//! ## Graceful Shutdown
//!
//! The sweep listens on a watch channel and finishes the current batch
//! before stopping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use uuid::Uuid;

use crate::domain::foundation::{PaymentId, Timestamp};
use crate::domain::payment::{ActivationRecord, ActivationState, Payment, PaymentError, PaymentStatus};
use crate::ports::PaymentLedger;

use super::{ActivationAttempt, EntitlementActivator};

/// Configuration for the ActivationSweep.
#[derive(Debug, Clone)]
pub struct ActivationSweepConfig {
    pub interval: Duration,
    pub batch_size: u32,
    pub stale_after: Duration,
}

impl Default for ActivationSweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 50,
            stale_after: Duration::from_secs(300),
        }
    }
}

impl ActivationSweepConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }
}

/// Counts from one sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub activated: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Result of an operator-requested retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Activated { new_expiry: Timestamp },
    Failed { reason: String },
    /// Activation was already acknowledged; nothing was called.
    AlreadyActivated { new_expiry: Option<Timestamp> },
    /// Another attempt is running and not yet stale.
    InProgress,
}

impl RetryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryOutcome::Activated { .. } => "activated",
            RetryOutcome::Failed { .. } => "activation-failed",
            RetryOutcome::AlreadyActivated { .. } => "already-activated",
            RetryOutcome::InProgress => "in-progress",
        }
    }
}

/// What the claim step decided for one payment.
enum Claim {
    Claimed(Payment),
    AlreadyActivated(Option<Timestamp>),
    NotDue,
}

/// Background service that retries owed entitlement activations.
pub struct ActivationSweep {
    ledger: Arc<dyn PaymentLedger>,
    activator: EntitlementActivator,
    config: ActivationSweepConfig,
}

impl ActivationSweep {
    pub fn new(ledger: Arc<dyn PaymentLedger>, activator: EntitlementActivator) -> Self {
        Self::with_config(ledger, activator, ActivationSweepConfig::default())
    }

    pub fn with_config(
        ledger: Arc<dyn PaymentLedger>,
        activator: EntitlementActivator,
        config: ActivationSweepConfig,
    ) -> Self {
        Self {
            ledger,
            activator,
            config,
        }
    }

    /// Run the sweep loop until shutdown signal is received.
    ///
    /// Store errors are logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "Activation sweep started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Activation sweep stopping");
                        return;
                    }
                }

                _ = interval.tick() => {
                    match self.process_batch().await {
                        Ok(report) if report.examined > 0 => {
                            tracing::info!(
                                examined = report.examined,
                                activated = report.activated,
                                failed = report.failed,
                                skipped = report.skipped,
                                "Activation sweep cycle finished"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::error!(error = %err, "Activation sweep cycle failed");
                        }
                    }
                }
            }
        }
    }

    /// Process a single batch of due activation records.
    pub async fn process_batch(&self) -> Result<SweepReport, PaymentError> {
        let stale_before = self.stale_before(Timestamp::now());
        let due = self
            .ledger
            .find_due_activations(stale_before, self.config.batch_size)
            .await?;

        let mut report = SweepReport::default();
        for record in due {
            report.examined += 1;
            match self.claim(&record.payment_id, stale_before).await? {
                Claim::Claimed(payment) => match self
                    .activator
                    .activate(&payment, &Uuid::new_v4().to_string())
                    .await
                {
                    ActivationAttempt::Activated { .. } => report.activated += 1,
                    ActivationAttempt::Failed { .. } => report.failed += 1,
                },
                Claim::AlreadyActivated(_) | Claim::NotDue => report.skipped += 1,
            }
        }
        Ok(report)
    }

    /// Operator retry for one payment.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the payment does not exist
    /// - `NotConfirmed` if the payment is not CONFIRMED
    pub async fn retry_payment(&self, payment_id: PaymentId) -> Result<RetryOutcome, PaymentError> {
        let stale_before = self.stale_before(Timestamp::now());
        match self.claim(&payment_id, stale_before).await? {
            Claim::Claimed(payment) => {
                tracing::info!(payment_id = %payment_id, "Operator retry of activation");
                Ok(match self
                    .activator
                    .activate(&payment, &Uuid::new_v4().to_string())
                    .await
                {
                    ActivationAttempt::Activated { new_expiry } => {
                        RetryOutcome::Activated { new_expiry }
                    }
                    ActivationAttempt::Failed { reason } => RetryOutcome::Failed { reason },
                })
            }
            Claim::AlreadyActivated(new_expiry) => Ok(RetryOutcome::AlreadyActivated { new_expiry }),
            Claim::NotDue => Ok(RetryOutcome::InProgress),
        }
    }

    fn stale_before(&self, now: Timestamp) -> Timestamp {
        now.minus_secs(self.config.stale_after.as_secs())
    }

    /// Locks the payment, re-checks its activation record, and marks it
    /// `in_progress` with a fresh timestamp so no other sweeper takes it.
    async fn claim(&self, payment_id: &PaymentId, stale_before: Timestamp) -> Result<Claim, PaymentError> {
        let mut uow = self.ledger.begin().await?;
        let Some(payment) = uow.lock_for_update(payment_id).await? else {
            uow.rollback().await?;
            return Err(PaymentError::not_found(*payment_id));
        };
        if payment.status() != PaymentStatus::Confirmed {
            uow.rollback().await?;
            return Err(PaymentError::not_confirmed(*payment_id));
        }

        let now = Timestamp::now();
        let record = match uow.activation(payment_id).await? {
            Some(record) if record.state == ActivationState::Activated => {
                uow.rollback().await?;
                return Ok(Claim::AlreadyActivated(record.new_expiry));
            }
            Some(record) if !record.is_due(stale_before) => {
                uow.rollback().await?;
                return Ok(Claim::NotDue);
            }
            Some(mut record) => {
                record.begin_retry(now);
                record
            }
            // Confirmed before activation records existed.
            None => ActivationRecord::started(*payment_id, now),
        };

        uow.upsert_activation(&record).await?;
        uow.commit().await?;
        tracing::debug!(
            payment_id = %payment_id,
            attempt = record.attempts,
            "Claimed activation"
        );
        Ok(Claim::Claimed(payment))
    }
}
