//! In-memory adapters for tests and local development.

mod in_memory_ledger;

pub use in_memory_ledger::{InMemoryPaymentLedger, InMemoryUnitOfWork};
