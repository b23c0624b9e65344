//! In-memory payment ledger.
//!
//! Used by tests and local development. Row locks are per-payment
//! `tokio::sync::Mutex`es held by the unit of work until commit or rollback,
//! so the locking behavior matches the Postgres adapter within one process.
//! Writes are staged in the unit of work and applied on commit.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::payment::{ActivationRecord, ExternalReference, Payment, PaymentRail};
use crate::ports::{LedgerError, LedgerUnitOfWork, PaymentLedger};

#[derive(Default)]
struct LedgerState {
    payments: HashMap<PaymentId, Payment>,
    by_reference: HashMap<(PaymentRail, ExternalReference), PaymentId>,
    activations: HashMap<PaymentId, ActivationRecord>,
    row_locks: HashMap<PaymentId, Arc<RowLock<()>>>,
}

struct Shared {
    state: Mutex<LedgerState>,
    lock_timeout: Option<Duration>,
    unavailable: AtomicBool,
}

impl Shared {
    fn state(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger marked unavailable".into()));
        }
        self.state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger state lock poisoned".into()))
    }
}

/// Payment ledger kept entirely in process memory.
#[derive(Clone)]
pub struct InMemoryPaymentLedger {
    shared: Arc<Shared>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Lock waits longer than `timeout` fail with `LedgerError::LockTimeout`.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(lock_timeout: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LedgerState::default()),
                lock_timeout,
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    // === Test Helpers ===

    /// Makes every subsequent operation fail with `LedgerError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of payment rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn payment_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .expect("InMemoryPaymentLedger: state lock poisoned")
            .payments
            .len()
    }

    /// Committed activation record for a payment.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn activation_record(&self, id: &PaymentId) -> Option<ActivationRecord> {
        self.shared
            .state
            .lock()
            .expect("InMemoryPaymentLedger: state lock poisoned")
            .activations
            .get(id)
            .cloned()
    }
}

impl Default for InMemoryPaymentLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn create_pending(&self, payment: &Payment) -> Result<(), LedgerError> {
        let mut state = self.shared.state()?;
        let key = (payment.rail(), payment.external_reference().clone());
        if state.by_reference.contains_key(&key) {
            return Err(LedgerError::DuplicateReference {
                rail: key.0,
                reference: key.1,
            });
        }
        state.by_reference.insert(key, *payment.id());
        state
            .row_locks
            .insert(*payment.id(), Arc::new(RowLock::new(())));
        state.payments.insert(*payment.id(), payment.clone());
        Ok(())
    }

    async fn find_by_reference(
        &self,
        rail: PaymentRail,
        reference: &ExternalReference,
    ) -> Result<Option<Payment>, LedgerError> {
        let state = self.shared.state()?;
        Ok(state
            .by_reference
            .get(&(rail, reference.clone()))
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        Ok(self.shared.state()?.payments.get(id).cloned())
    }

    async fn find_by_id_and_user(
        &self,
        id: &PaymentId,
        user_id: &UserId,
    ) -> Result<Option<Payment>, LedgerError> {
        Ok(self
            .shared
            .state()?
            .payments
            .get(id)
            .filter(|p| p.user_id() == user_id)
            .cloned())
    }

    async fn find_due_activations(
        &self,
        stale_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<ActivationRecord>, LedgerError> {
        let state = self.shared.state()?;
        let mut due: Vec<ActivationRecord> = state
            .activations
            .values()
            .filter(|r| r.is_due(stale_before))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.updated_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, LedgerError> {
        // Surface unavailability at begin, like a failed pool checkout.
        drop(self.shared.state()?);
        Ok(Box::new(InMemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            held: HashMap::new(),
            staged_payments: HashMap::new(),
            staged_activations: HashMap::new(),
        }))
    }
}

/// Unit of work over [`InMemoryPaymentLedger`].
///
/// Dropping it releases every held row lock and discards staged writes.
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    held: HashMap<PaymentId, OwnedMutexGuard<()>>,
    staged_payments: HashMap<PaymentId, Payment>,
    staged_activations: HashMap<PaymentId, ActivationRecord>,
}

impl InMemoryUnitOfWork {
    fn ensure_locked(&self, id: &PaymentId) -> Result<(), LedgerError> {
        if self.held.contains_key(id) {
            Ok(())
        } else {
            Err(LedgerError::NotLocked(*id))
        }
    }
}

#[async_trait]
impl LedgerUnitOfWork for InMemoryUnitOfWork {
    async fn lock_for_update(&mut self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        if !self.held.contains_key(id) {
            let row_lock = match self.shared.state()?.row_locks.get(id) {
                Some(lock) => Arc::clone(lock),
                None => return Ok(None),
            };
            let guard = match self.shared.lock_timeout {
                Some(timeout) => tokio::time::timeout(timeout, row_lock.lock_owned())
                    .await
                    .map_err(|_| {
                        LedgerError::LockTimeout(format!(
                            "payment {} still locked after {:?}",
                            id, timeout
                        ))
                    })?,
                None => row_lock.lock_owned().await,
            };
            self.held.insert(*id, guard);
        }

        if let Some(staged) = self.staged_payments.get(id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.shared.state()?.payments.get(id).cloned())
    }

    async fn save(&mut self, payment: &Payment) -> Result<(), LedgerError> {
        self.ensure_locked(payment.id())?;
        self.staged_payments.insert(*payment.id(), payment.clone());
        Ok(())
    }

    async fn activation(
        &mut self,
        payment_id: &PaymentId,
    ) -> Result<Option<ActivationRecord>, LedgerError> {
        self.ensure_locked(payment_id)?;
        if let Some(staged) = self.staged_activations.get(payment_id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.shared.state()?.activations.get(payment_id).cloned())
    }

    async fn upsert_activation(&mut self, record: &ActivationRecord) -> Result<(), LedgerError> {
        self.ensure_locked(&record.payment_id)?;
        self.staged_activations
            .insert(record.payment_id, record.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), LedgerError> {
        {
            let mut state = self.shared.state()?;
            for (id, payment) in self.staged_payments.drain() {
                state.payments.insert(id, payment);
            }
            for (id, record) in self.staged_activations.drain() {
                state.activations.insert(id, record);
            }
        }
        self.held.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}
