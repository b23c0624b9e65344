//! Payment ledger port.
//!
//! Durable keyed storage for payment rows and their activation records.
//! All mutation of an existing payment goes through a [`LedgerUnitOfWork`]
//! holding the row lock from [`LedgerUnitOfWork::lock_for_update`].
//!
//! # Example
//!
//! ```ignore
//! let mut uow = ledger.begin().await?;
//! let Some(mut payment) = uow.lock_for_update(&id).await? else {
//!     uow.rollback().await?;
//!     return Err(PaymentError::not_found(id));
//! };
//! if payment.confirm(Timestamp::now()).is_fresh() {
//!     uow.save(&payment).await?;
//! }
//! uow.commit().await?;
//! ```

use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::payment::{
    ActivationRecord, ExternalReference, Payment, PaymentError, PaymentRail,
};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by ledger implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A row with this (rail, reference) already exists.
    #[error("duplicate {rail} reference {reference}")]
    DuplicateReference {
        rail: PaymentRail,
        reference: ExternalReference,
    },

    /// `save` targeted a payment that does not exist.
    #[error("payment {0} not found")]
    NotFound(PaymentId),

    /// `save` was called without holding the row lock.
    #[error("payment {0} is not locked by this unit of work")]
    NotLocked(PaymentId),

    /// The store gave up waiting for the row lock.
    #[error("lock wait timed out: {0}")]
    LockTimeout(String),

    /// Connection loss or any other transient store fault.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// A persisted row could not be mapped back to the domain.
    #[error("corrupt ledger row: {0}")]
    Corrupt(String),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::LockTimeout(_) | LedgerError::Unavailable(_))
    }
}

impl From<LedgerError> for PaymentError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateReference { rail, reference } => {
                PaymentError::duplicate_reference(rail, reference)
            }
            LedgerError::NotFound(id) => PaymentError::not_found(id),
            LedgerError::LockTimeout(msg) => PaymentError::lock_timeout(msg),
            other => PaymentError::store(other.to_string()),
        }
    }
}

/// Read side and unit-of-work factory for the payment ledger.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Inserts a new PENDING payment.
    ///
    /// # Errors
    ///
    /// - `DuplicateReference` if the (rail, reference) pair exists. Callers
    ///   treat this as "already being processed" and load the existing row.
    async fn create_pending(&self, payment: &Payment) -> Result<(), LedgerError>;

    /// Looks up a payment by its rail reference. Takes no lock.
    async fn find_by_reference(
        &self,
        rail: PaymentRail,
        reference: &ExternalReference,
    ) -> Result<Option<Payment>, LedgerError>;

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError>;

    /// Looks up a payment only if it belongs to `user_id`.
    async fn find_by_id_and_user(
        &self,
        id: &PaymentId,
        user_id: &UserId,
    ) -> Result<Option<Payment>, LedgerError>;

    /// Returns activation records that are failed, or in progress and last
    /// touched before `stale_before`, oldest first.
    async fn find_due_activations(
        &self,
        stale_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<ActivationRecord>, LedgerError>;

    /// Opens a unit of work.
    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, LedgerError>;
}

/// Unit of work over the ledger.
///
/// Row locks are held until `commit` or `rollback`. Dropping the unit of
/// work without committing rolls it back.
#[async_trait]
pub trait LedgerUnitOfWork: Send {
    /// Acquires an exclusive lock on the payment row and returns it.
    ///
    /// Blocks while another unit of work holds the lock. Returns `None`
    /// when no such payment exists.
    async fn lock_for_update(&mut self, id: &PaymentId) -> Result<Option<Payment>, LedgerError>;

    /// Persists the full payment row.
    ///
    /// # Errors
    ///
    /// - `NotLocked` unless `lock_for_update` returned this payment earlier
    ///   in the same unit of work
    async fn save(&mut self, payment: &Payment) -> Result<(), LedgerError>;

    /// Reads the activation record of a payment locked by this unit of work.
    async fn activation(
        &mut self,
        payment_id: &PaymentId,
    ) -> Result<Option<ActivationRecord>, LedgerError>;

    /// Inserts or replaces the activation record of a locked payment.
    async fn upsert_activation(&mut self, record: &ActivationRecord) -> Result<(), LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_ledger_is_object_safe() {
        fn _accepts_dyn(_ledger: &dyn PaymentLedger) {}
        fn _accepts_uow(_uow: Box<dyn LedgerUnitOfWork>) {}
    }

    #[test]
    fn only_transient_faults_are_retryable() {
        assert!(LedgerError::LockTimeout("55P03".into()).is_retryable());
        assert!(LedgerError::Unavailable("reset".into()).is_retryable());
        assert!(!LedgerError::NotLocked(PaymentId::new()).is_retryable());
        assert!(!LedgerError::Corrupt("status".into()).is_retryable());
    }

    #[test]
    fn ledger_errors_map_to_payment_errors() {
        let timeout: PaymentError = LedgerError::LockTimeout("55P03".into()).into();
        assert!(timeout.is_retryable());

        let unavailable: PaymentError = LedgerError::Unavailable("reset".into()).into();
        assert!(matches!(unavailable, PaymentError::Store(_)));

        let duplicate: PaymentError = LedgerError::DuplicateReference {
            rail: PaymentRail::Card,
            reference: ExternalReference::new("pi_1").unwrap(),
        }
        .into();
        assert!(matches!(duplicate, PaymentError::DuplicateReference { .. }));
    }
}
