//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPaymentLedger` - Payment rows and activation records, with
//!   row locks held by `SELECT ... FOR UPDATE`

mod payment_ledger;

pub use payment_ledger::{PostgresPaymentLedger, PostgresUnitOfWork};
