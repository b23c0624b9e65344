//! PostgreSQL implementation of PaymentLedger.
//!
//! Row locks are `SELECT ... FOR UPDATE` inside a transaction, so mutual
//! exclusion holds across service instances. Each unit of work sets a local
//! `lock_timeout`; a timed-out wait surfaces as `LedgerError::LockTimeout`.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::payment::{
    ActivationRecord, ActivationState, ExternalReference, Payment, PaymentRail, PaymentStatus,
    Plan,
};
use crate::ports::{LedgerError, LedgerUnitOfWork, PaymentLedger};

const UNIQUE_REFERENCE_CONSTRAINT: &str = "payments_rail_external_reference_key";
const LOCK_NOT_AVAILABLE: &str = "55P03";

const PAYMENT_COLUMNS: &str = "id, user_id, rail, external_reference, amount, currency, plan, \
     duration_days, status, created_at, confirmed_at";

/// PostgreSQL implementation of the PaymentLedger port.
pub struct PostgresPaymentLedger {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresPaymentLedger {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: String,
    rail: String,
    external_reference: String,
    amount: Decimal,
    currency: String,
    plan: String,
    duration_days: i32,
    status: String,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = LedgerError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::domain::foundation::ValidationError| {
            LedgerError::Corrupt(format!("payment {}: {}", row.id, e))
        };
        let duration_days = u32::try_from(row.duration_days).map_err(|_| {
            LedgerError::Corrupt(format!(
                "payment {}: negative duration_days {}",
                row.id, row.duration_days
            ))
        })?;

        Payment::reconstitute(
            PaymentId::from_uuid(row.id),
            UserId::new(row.user_id.clone()).map_err(corrupt)?,
            row.rail.parse::<PaymentRail>().map_err(corrupt)?,
            ExternalReference::new(row.external_reference.clone()).map_err(corrupt)?,
            row.amount,
            row.currency.clone(),
            row.plan.parse::<Plan>().map_err(corrupt)?,
            duration_days,
            row.status.parse::<PaymentStatus>().map_err(corrupt)?,
            Timestamp::from_datetime(row.created_at),
            row.confirmed_at.map(Timestamp::from_datetime),
        )
        .map_err(corrupt)
    }
}

/// Database row representation of an activation record.
#[derive(Debug, sqlx::FromRow)]
struct ActivationRow {
    payment_id: Uuid,
    state: String,
    attempts: i32,
    last_error: Option<String>,
    new_expiry: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ActivationRow> for ActivationRecord {
    type Error = LedgerError;

    fn try_from(row: ActivationRow) -> Result<Self, Self::Error> {
        let state = row.state.parse::<ActivationState>().map_err(|e| {
            LedgerError::Corrupt(format!("activation {}: {}", row.payment_id, e))
        })?;
        Ok(ActivationRecord {
            payment_id: PaymentId::from_uuid(row.payment_id),
            state,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            last_error: row.last_error,
            new_expiry: row.new_expiry.map(Timestamp::from_datetime),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

/// Maps sqlx errors to ledger errors. Anything not recognized is transient.
fn map_sqlx_error(context: &str, err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            return LedgerError::LockTimeout(format!("{}: {}", context, db_err));
        }
    }
    LedgerError::Unavailable(format!("{}: {}", context, err))
}

#[async_trait]
impl PaymentLedger for PostgresPaymentLedger {
    async fn create_pending(&self, payment: &Payment) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, rail, external_reference, amount, currency, plan,
                duration_days, status, created_at, confirmed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.user_id().as_str())
        .bind(payment.rail().as_str())
        .bind(payment.external_reference().as_str())
        .bind(payment.amount())
        .bind(payment.currency())
        .bind(payment.plan().as_str())
        .bind(payment.duration_days() as i32)
        .bind(payment.status().as_str())
        .bind(*payment.created_at().as_datetime())
        .bind(payment.confirmed_at().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(UNIQUE_REFERENCE_CONSTRAINT) {
                    return LedgerError::DuplicateReference {
                        rail: payment.rail(),
                        reference: payment.external_reference().clone(),
                    };
                }
            }
            map_sqlx_error("Failed to insert payment", e)
        })?;

        Ok(())
    }

    async fn find_by_reference(
        &self,
        rail: PaymentRail,
        reference: &ExternalReference,
    ) -> Result<Option<Payment>, LedgerError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE rail = $1 AND external_reference = $2",
            PAYMENT_COLUMNS
        ))
        .bind(rail.as_str())
        .bind(reference.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find payment by reference", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_id_and_user(
        &self,
        id: &PaymentId,
        user_id: &UserId,
    ) -> Result<Option<Payment>, LedgerError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE id = $1 AND user_id = $2",
            PAYMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find payment for user", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_due_activations(
        &self,
        stale_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<ActivationRecord>, LedgerError> {
        let rows: Vec<ActivationRow> = sqlx::query_as(
            r#"
            SELECT payment_id, state, attempts, last_error, new_expiry, updated_at
            FROM payment_activations
            WHERE state = 'failed'
               OR (state = 'in_progress' AND updated_at < $1)
            ORDER BY updated_at ASC
            LIMIT $2
            "#,
        )
        .bind(*stale_before.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find due activations", e))?;

        rows.into_iter().map(ActivationRecord::try_from).collect()
    }

    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin transaction", e))?;

        // SET does not take bind parameters; the value is an integer we own.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to set lock timeout", e))?;

        Ok(Box::new(PostgresUnitOfWork {
            tx,
            locked: HashSet::new(),
        }))
    }
}

/// Unit of work backed by one Postgres transaction.
///
/// Dropping it without commit rolls the transaction back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<PaymentId>,
}

impl PostgresUnitOfWork {
    fn ensure_locked(&self, id: &PaymentId) -> Result<(), LedgerError> {
        if self.locked.contains(id) {
            Ok(())
        } else {
            Err(LedgerError::NotLocked(*id))
        }
    }
}

#[async_trait]
impl LedgerUnitOfWork for PostgresUnitOfWork {
    async fn lock_for_update(&mut self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to lock payment", e))?;

        match row {
            Some(row) => {
                self.locked.insert(*id);
                Payment::try_from(row).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn save(&mut self, payment: &Payment) -> Result<(), LedgerError> {
        self.ensure_locked(payment.id())?;

        // Only status and confirmed_at are mutable.
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                confirmed_at = $3
            WHERE id = $1
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.status().as_str())
        .bind(payment.confirmed_at().map(|t| *t.as_datetime()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to save payment", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(*payment.id()));
        }
        Ok(())
    }

    async fn activation(
        &mut self,
        payment_id: &PaymentId,
    ) -> Result<Option<ActivationRecord>, LedgerError> {
        self.ensure_locked(payment_id)?;

        let row: Option<ActivationRow> = sqlx::query_as(
            r#"
            SELECT payment_id, state, attempts, last_error, new_expiry, updated_at
            FROM payment_activations
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to load activation record", e))?;

        row.map(ActivationRecord::try_from).transpose()
    }

    async fn upsert_activation(&mut self, record: &ActivationRecord) -> Result<(), LedgerError> {
        self.ensure_locked(&record.payment_id)?;

        sqlx::query(
            r#"
            INSERT INTO payment_activations (
                payment_id, state, attempts, last_error, new_expiry, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (payment_id) DO UPDATE SET
                state = EXCLUDED.state,
                attempts = EXCLUDED.attempts,
                last_error = EXCLUDED.last_error,
                new_expiry = EXCLUDED.new_expiry,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.payment_id.as_uuid())
        .bind(record.state.as_str())
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(&record.last_error)
        .bind(record.new_expiry.map(|t| *t.as_datetime()))
        .bind(*record.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to upsert activation record", e))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("Failed to roll back", e))
    }
}
